//! Per-match driver. The instance holding a match's lease runs one
//! task that consumes routed player frames, its own timers and the
//! lease heartbeat, serializing every state transition of the match.
//!
//! All deadlines derive from persisted timestamps so another instance
//! resumes correctly after a takeover.

use crate::{
    database::entities::{
        DraftActionKind, Match, MatchStatus, MatchVote, PickBanData, Player, QueuePlayer,
    },
    services::{
        acceptance::{AcceptanceOutcome, AcceptanceState},
        draft::{self, DraftError, TimeoutOutcome},
        events::Event,
        gateway::GatewayError,
        votes,
    },
    session::models::{ErrorCode, ServerFrame},
    state::AppState,
    utils::types::{LcuGameId, MatchId},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use sea_orm::DbErr;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

/// Player originated inputs routed into a match task
#[derive(Debug)]
pub enum MatchInput {
    Accept { summoner_name: String },
    Decline { summoner_name: String },
    DraftAction {
        summoner_name: String,
        index: u32,
        champion_id: u32,
    },
    DraftEdit {
        summoner_name: String,
        index: u32,
        champion_id: u32,
    },
    DraftConfirm { summoner_name: String },
    /// A vote row changed, re-evaluate the quorum
    VoteRecorded,
    CancelRequested { summoner_name: String },
}

/// Map of matches currently driven by this instance
#[derive(Default)]
pub struct ActiveMatches {
    map: Mutex<HashMap<MatchId, mpsc::UnboundedSender<MatchInput>>>,
}

impl ActiveMatches {
    pub fn contains(&self, match_id: MatchId) -> bool {
        self.map.lock().contains_key(&match_id)
    }

    /// Delivers an input to the local runner, handing it back when
    /// this instance does not drive the match
    pub fn send(&self, match_id: MatchId, input: MatchInput) -> Result<(), MatchInput> {
        let map = self.map.lock();
        match map.get(&match_id) {
            Some(sender) => sender.send(input).map_err(|err| err.0),
            None => Err(input),
        }
    }

    fn insert(&self, match_id: MatchId, sender: mpsc::UnboundedSender<MatchInput>) {
        self.map.lock().insert(match_id, sender);
    }

    fn remove(&self, match_id: MatchId) {
        self.map.lock().remove(&match_id);
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    /// The match is driven elsewhere and the lease could not be
    /// taken, the client should retry against the owning instance
    #[error("Wrong instance")]
    WrongInstance,
    #[error("Match not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] DbErr),
}

/// Routes a player input to the match runner. When nothing drives
/// the match locally this doubles as the takeover trigger: seeing
/// activity, the instance attempts the lease claim itself
pub async fn route_input(
    app: &AppState,
    match_id: MatchId,
    input: MatchInput,
) -> Result<(), RouteError> {
    let input = match app.active_matches.send(match_id, input) {
        Ok(()) => return Ok(()),
        Err(input) => input,
    };

    let model = Match::by_id(&app.db, match_id)
        .await?
        .ok_or(RouteError::NotFound)?;
    if model.status.is_terminal() {
        return Err(RouteError::NotFound);
    }

    if !app.ownership.claim(match_id).await? {
        return Err(RouteError::WrongInstance);
    }

    spawn(app.clone(), match_id);
    // The channel registered synchronously above, redelivery cannot
    // miss it
    _ = app.active_matches.send(match_id, input);
    Ok(())
}

/// Starts driving a match on this instance. The caller must already
/// hold the lease
pub fn spawn(app: AppState, match_id: MatchId) {
    if app.active_matches.contains(match_id) {
        return;
    }

    let (sender, receiver) = mpsc::unbounded_channel();
    app.active_matches.insert(match_id, sender);

    tokio::spawn(async move {
        debug!("Driving match {match_id} on {}", app.instance_id);
        let result = drive(&app, match_id, receiver).await;
        app.active_matches.remove(match_id);
        match result {
            Ok(()) => debug!("Stopped driving match {match_id}"),
            Err(DriveError::LeaseLost) => {
                // Silently stop, the new owner resumes from storage
                debug!("Lease lost for match {match_id}");
            }
            Err(DriveError::Store(err)) => {
                error!("Storage failure while driving match {match_id}: {err}");
            }
        }
    });
}

#[derive(Debug, Error)]
enum DriveError {
    #[error("lease lost")]
    LeaseLost,
    #[error(transparent)]
    Store(#[from] DbErr),
}

async fn drive(
    app: &AppState,
    match_id: MatchId,
    mut receiver: mpsc::UnboundedReceiver<MatchInput>,
) -> Result<(), DriveError> {
    loop {
        let model = match Match::by_id(&app.db, match_id).await? {
            Some(value) => value,
            None => return Ok(()),
        };

        match model.status {
            MatchStatus::Pending | MatchStatus::Found => {
                acceptance_phase(app, model, &mut receiver).await?
            }
            MatchStatus::Accepted => enter_draft(app, model).await?,
            MatchStatus::Draft => draft_phase(app, model, &mut receiver).await?,
            MatchStatus::InProgress => game_phase(app, model, &mut receiver).await?,
            MatchStatus::Completed | MatchStatus::Cancelled => return Ok(()),
        }
    }
}

/// Publishes an event, logging instead of failing the runner when the
/// broadcast layer is down: the state change is already committed
async fn publish_committed(app: &AppState, event: Event) {
    if let Err(err) = app.bus.publish(event).await {
        error!("Broadcast failed after committed transition: {err}");
    }
}

fn reply_error(app: &AppState, summoner_name: &str, code: ErrorCode, message: impl Into<String>) {
    if let Some(handle) = app.registry.lookup_local(summoner_name) {
        handle.push(ServerFrame::Error {
            code,
            message: message.into(),
        });
    }
}

/// Converts a persisted deadline into a tokio sleep duration
fn until(deadline: DateTime<Utc>) -> Duration {
    (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

// ---- acceptance (found -> accepted | cancelled) ----

async fn acceptance_phase(
    app: &AppState,
    model: Match,
    receiver: &mut mpsc::UnboundedReceiver<MatchInput>,
) -> Result<(), DriveError> {
    let match_id = model.id;
    let deadline =
        model.created_at + ChronoDuration::seconds(app.config.acceptance.timeout_seconds as i64);

    let mut snapshot = model.queue_snapshot.clone();
    let mut state = AcceptanceState::from_snapshot(&snapshot);
    let mut heartbeat = tokio::time::interval(app.ownership.heartbeat_interval());
    heartbeat.reset();

    // A takeover may resume a window that is already decided
    if let Some(outcome) = state.outcome(Utc::now() >= deadline) {
        return settle_acceptance(app, &model, outcome, &state).await;
    }

    loop {
        tokio::select! {
            input = receiver.recv() => {
                let Some(input) = input else { return Ok(()) };
                let (summoner_name, accepted) = match input {
                    MatchInput::Accept { summoner_name } => (summoner_name, true),
                    MatchInput::Decline { summoner_name } => (summoner_name, false),
                    MatchInput::CancelRequested { summoner_name } => (summoner_name, false),
                    // Draft and vote frames are meaningless here
                    _ => continue,
                };

                if !state.apply(&summoner_name, accepted) {
                    continue;
                }

                // Record the response in the frozen snapshot before
                // acknowledging anything
                if let Some(player) = snapshot.get_mut(&summoner_name) {
                    player.acceptance_status = if accepted {
                        crate::database::entities::AcceptanceStatus::Accepted
                    } else {
                        crate::database::entities::AcceptanceStatus::Declined
                    };
                }
                if !Match::store_queue_snapshot(&app.db, match_id, &app.instance_id, snapshot.clone())
                    .await?
                {
                    return Err(DriveError::LeaseLost);
                }

                publish_committed(app, Event::MatchAcceptance {
                    match_id,
                    summoner_name,
                    accepted: state.accepted_count() as u32,
                    total: state.total() as u32,
                }).await;

                if let Some(outcome) = state.outcome(false) {
                    return settle_acceptance(app, &model, outcome, &state).await;
                }
            }
            _ = tokio::time::sleep(until(deadline)) => {
                let outcome = state
                    .outcome(true)
                    .unwrap_or(AcceptanceOutcome::AllAccepted);
                return settle_acceptance(app, &model, outcome, &state).await;
            }
            _ = heartbeat.tick() => {
                if !app.ownership.refresh(match_id).await? {
                    return Err(DriveError::LeaseLost);
                }
            }
        }
    }
}

async fn settle_acceptance(
    app: &AppState,
    model: &Match,
    outcome: AcceptanceOutcome,
    state: &AcceptanceState,
) -> Result<(), DriveError> {
    let match_id = model.id;
    match outcome {
        AcceptanceOutcome::AllAccepted => {
            if !Match::advance_status(
                &app.db,
                match_id,
                &app.instance_id,
                model.status,
                MatchStatus::Accepted,
            )
            .await?
            {
                return Err(DriveError::LeaseLost);
            }
            info!("Match {match_id} accepted by all players");
            Ok(())
        }
        AcceptanceOutcome::Failed { at_fault } => {
            // Survivors return to the queue with their original join
            // time, decliners and non-responders must queue again
            for name in state.accepted_players() {
                if let Some(player) = model.queue_snapshot.get(name) {
                    if let Err(err) = QueuePlayer::restore(&app.db, player).await {
                        warn!("Failed to restore {name} to queue: {err}");
                    }
                }
            }

            if !Match::advance_status(
                &app.db,
                match_id,
                &app.instance_id,
                model.status,
                MatchStatus::Cancelled,
            )
            .await?
            {
                return Err(DriveError::LeaseLost);
            }
            app.ownership.clear_hint(match_id).await;

            info!("Match {match_id} cancelled (at fault: {at_fault:?})");
            publish_committed(app, Event::MatchCancelled { match_id, at_fault }).await;
            Ok(())
        }
    }
}

// ---- draft entry (accepted -> draft) ----

async fn enter_draft(app: &AppState, model: Match) -> Result<(), DriveError> {
    let match_id = model.id;

    // Restart the first action timer, the skeleton timestamp dates
    // back to match creation
    let mut pick_ban = model
        .pick_ban_data
        .unwrap_or_else(|| draft::create_pick_ban(&model.team1_players.0, &model.team2_players.0, Utc::now()));
    pick_ban.current_action_started_at = Utc::now();

    if !Match::store_pick_ban(&app.db, match_id, &app.instance_id, pick_ban).await? {
        return Err(DriveError::LeaseLost);
    }
    if !Match::advance_status(
        &app.db,
        match_id,
        &app.instance_id,
        MatchStatus::Accepted,
        MatchStatus::Draft,
    )
    .await?
    {
        return Err(DriveError::LeaseLost);
    }

    info!("Draft started for match {match_id}");
    publish_committed(app, Event::DraftStarted { match_id }).await;
    Ok(())
}

// ---- draft (draft -> in_progress) ----

async fn draft_phase(
    app: &AppState,
    model: Match,
    receiver: &mut mpsc::UnboundedReceiver<MatchInput>,
) -> Result<(), DriveError> {
    let match_id = model.id;
    let participants: Vec<String> = model.participants().cloned().collect();
    let action_timeout = ChronoDuration::seconds(app.config.draft.action_timeout_seconds as i64);

    let mut pick_ban = match model.pick_ban_data.clone() {
        Some(value) => value,
        // Unreachable through the normal flow, rebuild and resume
        None => draft::create_pick_ban(&model.team1_players.0, &model.team2_players.0, Utc::now()),
    };

    let mut heartbeat = tokio::time::interval(app.ownership.heartbeat_interval());
    heartbeat.reset();

    loop {
        if draft::is_complete(&pick_ban) {
            if !app.config.draft.confirmation_required
                || pick_ban.confirmations.len() == participants.len()
            {
                return finish_draft(app, match_id).await;
            }

            // Confirmation stage, no timer: wait for confirms and
            // edits only
            tokio::select! {
                input = receiver.recv() => {
                    let Some(input) = input else { return Ok(()) };
                    handle_confirm_stage_input(
                        app,
                        match_id,
                        &participants,
                        &mut pick_ban,
                        input,
                    )
                    .await?;
                }
                _ = heartbeat.tick() => {
                    if !app.ownership.refresh(match_id).await? {
                        return Err(DriveError::LeaseLost);
                    }
                }
            }
            continue;
        }

        let deadline = draft::action_deadline(&pick_ban, action_timeout);
        tokio::select! {
            input = receiver.recv() => {
                let Some(input) = input else { return Ok(()) };
                handle_draft_input(app, match_id, &mut pick_ban, input).await?;
            }
            _ = tokio::time::sleep(until(deadline)) => {
                let outcome =
                    draft::apply_timeout(&mut pick_ban, &app.config.draft.champion_pool, Utc::now());
                let Some(outcome) = outcome else { continue };
                if !Match::store_pick_ban(&app.db, match_id, &app.instance_id, pick_ban.clone())
                    .await?
                {
                    return Err(DriveError::LeaseLost);
                }

                match outcome {
                    TimeoutOutcome::Skipped { index } => {
                        let action = &pick_ban.actions[index as usize];
                        let event = match action.kind {
                            DraftActionKind::Ban => Event::DraftBan {
                                match_id,
                                index,
                                by_player: action.by_player.clone(),
                                champion_id: None,
                            },
                            DraftActionKind::Pick => Event::DraftPick {
                                match_id,
                                index,
                                by_player: action.by_player.clone(),
                                champion_id: None,
                            },
                        };
                        publish_committed(app, event).await;
                    }
                    TimeoutOutcome::AutoPicked { index, champion_id } => {
                        let by_player = pick_ban.actions[index as usize].by_player.clone();
                        publish_committed(app, Event::DraftPick {
                            match_id,
                            index,
                            by_player,
                            champion_id: Some(champion_id),
                        }).await;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if !app.ownership.refresh(match_id).await? {
                    return Err(DriveError::LeaseLost);
                }
            }
        }
    }
}

async fn handle_draft_input(
    app: &AppState,
    match_id: MatchId,
    pick_ban: &mut PickBanData,
    input: MatchInput,
) -> Result<(), DriveError> {
    match input {
        MatchInput::DraftAction {
            summoner_name,
            index,
            champion_id,
        } => {
            match draft::apply_action(pick_ban, &summoner_name, index, champion_id, Utc::now()) {
                Ok(action) => {
                    if !Match::store_pick_ban(&app.db, match_id, &app.instance_id, pick_ban.clone())
                        .await?
                    {
                        return Err(DriveError::LeaseLost);
                    }
                    let event = match action.kind {
                        DraftActionKind::Ban => Event::DraftBan {
                            match_id,
                            index,
                            by_player: summoner_name,
                            champion_id: Some(champion_id),
                        },
                        DraftActionKind::Pick => Event::DraftPick {
                            match_id,
                            index,
                            by_player: summoner_name,
                            champion_id: Some(champion_id),
                        },
                    };
                    publish_committed(app, event).await;
                }
                Err(err) => reply_draft_error(app, &summoner_name, err),
            }
        }
        MatchInput::DraftEdit {
            summoner_name,
            index,
            champion_id,
        } => {
            edit_draft(app, match_id, pick_ban, &summoner_name, index, champion_id).await?;
        }
        MatchInput::DraftConfirm { summoner_name } => {
            reply_error(
                app,
                &summoner_name,
                ErrorCode::InvalidInput,
                DraftError::NotConfirming.to_string(),
            );
        }
        MatchInput::CancelRequested { summoner_name } => {
            return cancel_match(app, match_id, MatchStatus::Draft, &summoner_name).await;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_confirm_stage_input(
    app: &AppState,
    match_id: MatchId,
    participants: &[String],
    pick_ban: &mut PickBanData,
    input: MatchInput,
) -> Result<(), DriveError> {
    match input {
        MatchInput::DraftConfirm { summoner_name } => {
            match draft::apply_confirm(pick_ban, &summoner_name, participants) {
                Ok(_confirmed) => {
                    if !Match::store_pick_ban(&app.db, match_id, &app.instance_id, pick_ban.clone())
                        .await?
                    {
                        return Err(DriveError::LeaseLost);
                    }
                }
                Err(err) => reply_draft_error(app, &summoner_name, err),
            }
        }
        MatchInput::DraftEdit {
            summoner_name,
            index,
            champion_id,
        } => {
            edit_draft(app, match_id, pick_ban, &summoner_name, index, champion_id).await?;
        }
        MatchInput::CancelRequested { summoner_name } => {
            return cancel_match(app, match_id, MatchStatus::Draft, &summoner_name).await;
        }
        _ => {}
    }
    Ok(())
}

async fn edit_draft(
    app: &AppState,
    match_id: MatchId,
    pick_ban: &mut PickBanData,
    summoner_name: &str,
    index: u32,
    champion_id: u32,
) -> Result<(), DriveError> {
    match draft::apply_edit(pick_ban, summoner_name, index, champion_id) {
        Ok(_) => {
            if !Match::store_pick_ban(&app.db, match_id, &app.instance_id, pick_ban.clone()).await?
            {
                return Err(DriveError::LeaseLost);
            }
            publish_committed(
                app,
                Event::DraftEdit {
                    match_id,
                    index,
                    by_player: summoner_name.to_string(),
                    champion_id,
                },
            )
            .await;
        }
        Err(err) => reply_draft_error(app, summoner_name, err),
    }
    Ok(())
}

fn reply_draft_error(app: &AppState, summoner_name: &str, err: DraftError) {
    let code = match err {
        DraftError::NotYourTurn => ErrorCode::NotYourTurn,
        DraftError::ChampionAlreadyUsed => ErrorCode::ChampionAlreadyUsed,
        DraftError::NotParticipant => ErrorCode::NotParticipant,
        DraftError::InvalidEdit | DraftError::NotConfirming => ErrorCode::InvalidInput,
    };
    reply_error(app, summoner_name, code, err.to_string());
}

async fn finish_draft(app: &AppState, match_id: MatchId) -> Result<(), DriveError> {
    if !Match::advance_status(
        &app.db,
        match_id,
        &app.instance_id,
        MatchStatus::Draft,
        MatchStatus::InProgress,
    )
    .await?
    {
        return Err(DriveError::LeaseLost);
    }

    info!("Draft completed for match {match_id}");
    publish_committed(app, Event::DraftCompleted { match_id }).await;
    publish_committed(app, Event::GameStarted { match_id }).await;
    Ok(())
}

async fn cancel_match(
    app: &AppState,
    match_id: MatchId,
    from: MatchStatus,
    requested_by: &str,
) -> Result<(), DriveError> {
    if !Match::advance_status(
        &app.db,
        match_id,
        &app.instance_id,
        from,
        MatchStatus::Cancelled,
    )
    .await?
    {
        return Err(DriveError::LeaseLost);
    }
    app.ownership.clear_hint(match_id).await;

    info!("Match {match_id} cancelled on request of {requested_by}");
    publish_committed(
        app,
        Event::MatchCancelled {
            match_id,
            at_fault: Vec::new(),
        },
    )
    .await;
    Ok(())
}

// ---- in game (in_progress -> completed | cancelled) ----

/// Gameflow phases reported by the client that mark the game as over
const END_PHASES: [&str; 2] = ["EndOfGame", "PostGame"];
const GAMEFLOW_PATH: &str = "/lol-gameflow/v1/gameflow-phase";

async fn game_phase(
    app: &AppState,
    model: Match,
    receiver: &mut mpsc::UnboundedReceiver<MatchInput>,
) -> Result<(), DriveError> {
    let match_id = model.id;
    let participants: Vec<String> = model.participants().cloned().collect();

    let mut poll = tokio::time::interval(Duration::from_secs(
        app.config.game_monitor.poll_interval_seconds,
    ));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut heartbeat = tokio::time::interval(app.ownership.heartbeat_interval());
    heartbeat.reset();

    let inactivity_limit =
        Duration::from_secs(app.config.game_monitor.inactivity_cancel_seconds);
    let mut last_reachable = Instant::now();
    let mut vote_open = false;

    // A takeover may land mid link-vote with a quorum already reached
    if try_link(app, &model, &participants).await? {
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = poll.tick() => {
                if vote_open {
                    continue;
                }

                let mut any_reachable = false;
                let mut finished_reporter: Option<String> = None;

                for summoner_name in &participants {
                    match app
                        .gateway
                        .request(&app.registry, &app.bus, summoner_name, "GET", GAMEFLOW_PATH, None)
                        .await
                    {
                        Ok(response) => {
                            any_reachable = true;
                            let phase = response
                                .body
                                .as_ref()
                                .and_then(|body| body.as_str())
                                .unwrap_or_default();
                            if END_PHASES.contains(&phase) {
                                finished_reporter = Some(summoner_name.clone());
                                break;
                            }
                        }
                        Err(GatewayError::Offline) | Err(GatewayError::Timeout)
                        | Err(GatewayError::Disconnected) => {}
                        Err(err) => {
                            debug!("Gameflow poll failed for {summoner_name}: {err}");
                        }
                    }
                }

                if any_reachable {
                    last_reachable = Instant::now();
                }

                if let Some(reported_by) = finished_reporter {
                    info!("Game ended for match {match_id}, opening link vote");
                    vote_open = true;
                    publish_committed(app, Event::GameEnded { match_id, reported_by }).await;
                    continue;
                }

                if last_reachable.elapsed() >= inactivity_limit {
                    warn!("No participant reachable for match {match_id}, cancelling");
                    return cancel_match(app, match_id, MatchStatus::InProgress, "game-monitor").await;
                }
            }
            input = receiver.recv() => {
                let Some(input) = input else { return Ok(()) };
                match input {
                    MatchInput::VoteRecorded => {
                        if try_link(app, &model, &participants).await? {
                            return Ok(());
                        }
                    }
                    MatchInput::CancelRequested { summoner_name } => {
                        return cancel_match(
                            app,
                            match_id,
                            MatchStatus::InProgress,
                            &summoner_name,
                        )
                        .await;
                    }
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if !app.ownership.refresh(match_id).await? {
                    return Err(DriveError::LeaseLost);
                }
            }
        }
    }
}

/// Checks the weighted quorum and, once decisive, pulls the vendor
/// payload, settles ratings and completes the match. Returns true
/// when the match reached a terminal state
async fn try_link(
    app: &AppState,
    model: &Match,
    participants: &[String],
) -> Result<bool, DriveError> {
    let match_id = model.id;
    let vote_rows = MatchVote::all_for_match(&app.db, match_id).await?;

    let Some(game_id) = votes::decide(
        &vote_rows,
        &app.vote_weights,
        participants,
        app.config.link_vote.quorum,
    ) else {
        return Ok(false);
    };

    // Ask a voter of the winning game for the payload, any of them
    // observed it locally
    let voters: Vec<&str> = vote_rows
        .iter()
        .filter(|vote| vote.lcu_game_id == game_id)
        .map(|vote| vote.summoner_name.as_str())
        .collect();

    let Some(payload) = fetch_game_payload(app, &voters, game_id).await else {
        // Unreachable gateways, the next vote or poll retries
        warn!("Could not fetch payload of game {game_id} for match {match_id}");
        return Ok(false);
    };

    let Some(winner_team) =
        votes::derive_winner(&payload, &model.team1_players.0, &model.team2_players.0)
    else {
        warn!("Payload of game {game_id} carries no winner, retrying later");
        return Ok(false);
    };

    if !Match::complete_linked(&app.db, match_id, &app.instance_id, game_id, payload, winner_team)
        .await?
    {
        return Err(DriveError::LeaseLost);
    }
    app.ownership.clear_hint(match_id).await;

    settle_ratings(app, model, winner_team).await;

    info!("Match {match_id} linked to game {game_id}, winner team {winner_team}");
    publish_committed(
        app,
        Event::GameLinked {
            match_id,
            riot_game_id: game_id,
            winner_team,
        },
    )
    .await;

    Ok(true)
}

async fn fetch_game_payload(
    app: &AppState,
    voters: &[&str],
    game_id: LcuGameId,
) -> Option<serde_json::Value> {
    let path = format!("/lol-match-history/v1/games/{game_id}");
    for summoner_name in voters {
        match app
            .gateway
            .request(&app.registry, &app.bus, summoner_name, "GET", &path, None)
            .await
        {
            Ok(response) if response.status < 300 => return response.body,
            Ok(response) => {
                debug!(
                    "Gateway of {summoner_name} returned {} for game {game_id}",
                    response.status
                );
            }
            Err(err) => {
                debug!("Payload fetch through {summoner_name} failed: {err}");
            }
        }
    }
    None
}

/// Applies win/loss deltas and counters to every participant
async fn settle_ratings(app: &AppState, model: &Match, winner_team: i32) {
    let results = model
        .team1_players
        .0
        .iter()
        .map(|name| (name, winner_team == 1))
        .chain(
            model
                .team2_players
                .0
                .iter()
                .map(|name| (name, winner_team == 2)),
        );

    for (summoner_name, won) in results {
        let delta = if won {
            app.config.rating.win_delta
        } else {
            app.config.rating.loss_delta
        };

        let updated = match Player::by_name(&app.db, summoner_name).await {
            Ok(Some(player)) => player.apply_result(&app.db, won, delta).await,
            Ok(None) => continue,
            Err(err) => Err(err),
        };
        if let Err(err) = updated {
            error!("Failed to settle rating for {summoner_name}: {err}");
        }
    }
}
