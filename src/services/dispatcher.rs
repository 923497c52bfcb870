//! Event consumer. Every instance runs one dispatcher that dedupes
//! bus deliveries through the inbox, translates events into pushes
//! for its locally connected players and reacts to the fabric events
//! (ownership claims, gateway forwarding, session invalidation).

use crate::{
    database::{
        entities::{event_inbox, Match},
        DbErr,
    },
    services::{
        events::{Event, EventEnvelope},
        gateway::{GatewayError, LcuResponse},
        queue, runner,
        runner::MatchInput,
        votes,
    },
    session::models::{DraftUpdateKind, ServerFrame},
    state::AppState,
    utils::types::MatchId,
};
use log::{debug, error, warn};
use tokio::sync::broadcast::error::RecvError;

/// Consumes the local event stream until shutdown
pub async fn run(app: AppState) {
    let mut receiver = app.bus.subscribe();
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if let Err(err) = handle(&app, envelope).await {
                    error!("Event handling failed: {err}");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event dispatcher lagged, skipped {skipped} events");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

async fn handle(app: &AppState, envelope: EventEnvelope) -> Result<(), DbErr> {
    // Inbox dedupe: the self-delivered copy of a published event wins
    // the insert, the Redis loopback copy lands here again and drops
    let fresh = event_inbox::Model::insert_once(
        &app.db,
        &envelope.event_id.to_string(),
        &app.instance_id,
    )
    .await?;
    if !fresh {
        return Ok(());
    }

    debug!("Handling event {}", envelope.event.topic());

    match envelope.event {
        Event::QueueUpdate {
            players_in_queue,
            players,
        } => {
            push_all_local(
                app,
                ServerFrame::QueueUpdate {
                    players_in_queue,
                    players,
                },
            );
        }
        Event::QueuePlayerJoined { summoner_name } => {
            push_all_local(app, ServerFrame::QueuePlayerJoined { summoner_name });
        }
        Event::QueuePlayerLeft { summoner_name } => {
            push_all_local(app, ServerFrame::QueuePlayerLeft { summoner_name });
        }
        Event::MatchFound { match_id } => {
            notify_match_found(app, match_id).await?;

            // Every instance races for the lease, the row update
            // decides the driver
            if !app.active_matches.contains(match_id) && app.ownership.claim(match_id).await? {
                runner::spawn(app.clone(), match_id);
            }
        }
        Event::MatchAcceptance {
            match_id,
            accepted,
            total,
            ..
        } => {
            push_participants(
                app,
                match_id,
                ServerFrame::AcceptanceUpdate {
                    match_id,
                    accepted,
                    total,
                },
            )
            .await?;
        }
        Event::MatchCancelled { match_id, at_fault } => {
            push_participants_and_faulted(
                app,
                match_id,
                ServerFrame::MatchCancelled {
                    match_id,
                    at_fault: at_fault.clone(),
                },
                &at_fault,
            )
            .await?;

            // Survivors were restored by the owner, feed the builder
            if let Err(err) = queue::process(app).await {
                warn!("Queue wake after cancellation failed: {err}");
            }
        }
        Event::DraftStarted { match_id } => {
            push_participants(app, match_id, ServerFrame::DraftStarted { match_id }).await?;
        }
        Event::DraftPick {
            match_id,
            index,
            by_player,
            champion_id,
        } => {
            push_participants(
                app,
                match_id,
                ServerFrame::DraftUpdate {
                    match_id,
                    update: DraftUpdateKind::Pick,
                    index,
                    by_player,
                    champion_id,
                },
            )
            .await?;
        }
        Event::DraftBan {
            match_id,
            index,
            by_player,
            champion_id,
        } => {
            push_participants(
                app,
                match_id,
                ServerFrame::DraftUpdate {
                    match_id,
                    update: DraftUpdateKind::Ban,
                    index,
                    by_player,
                    champion_id,
                },
            )
            .await?;
        }
        Event::DraftEdit {
            match_id,
            index,
            by_player,
            champion_id,
        } => {
            push_participants(
                app,
                match_id,
                ServerFrame::DraftUpdate {
                    match_id,
                    update: DraftUpdateKind::Edit,
                    index,
                    by_player,
                    champion_id: Some(champion_id),
                },
            )
            .await?;
        }
        Event::DraftCompleted { match_id } => {
            push_participants(app, match_id, ServerFrame::DraftCompleted { match_id }).await?;
        }
        Event::GameStarted { match_id } => {
            push_participants(app, match_id, ServerFrame::GameStarted { match_id }).await?;
        }
        Event::GameEnded { match_id, .. } => {
            push_participants(app, match_id, ServerFrame::GameEnded { match_id }).await?;
        }
        Event::GameVote { match_id, .. } => {
            // The owner re-evaluates the quorum, everyone refreshes
            // the modal tallies
            _ = app.active_matches.send(match_id, MatchInput::VoteRecorded);

            match votes::weighted_votes(app, match_id).await {
                Ok(tallies) => {
                    push_participants(
                        app,
                        match_id,
                        ServerFrame::VoteUpdate {
                            match_id,
                            votes: tallies,
                        },
                    )
                    .await?;
                }
                Err(err) => warn!("Failed to tally votes for match {match_id}: {err}"),
            }
        }
        Event::GameLinked {
            match_id,
            riot_game_id,
            winner_team,
        } => {
            push_participants(
                app,
                match_id,
                ServerFrame::GameLinked {
                    match_id,
                    riot_game_id,
                    winner_team,
                },
            )
            .await?;
        }
        Event::SpectatorMuted {
            match_id,
            summoner_name,
            target,
        } => {
            push_participants(
                app,
                match_id,
                ServerFrame::SpectatorMuted {
                    match_id,
                    summoner_name,
                    target,
                },
            )
            .await?;
        }
        Event::SessionInvalidated {
            summoner_name,
            instance_id,
        } => {
            // Only the named holder drops its stale connection
            if instance_id == app.instance_id {
                if let Some(handle) = app.registry.take_local(&summoner_name) {
                    handle.close_duplicate();
                }
            }
        }
        Event::GatewayRequest {
            request_id,
            summoner_name,
            method,
            path,
            body,
        } => {
            // Answering involves a full client round trip, keep the
            // event loop moving meanwhile
            let app = app.clone();
            tokio::spawn(async move {
                answer_gateway_request(&app, request_id, &summoner_name, &method, &path, body)
                    .await;
            });
        }
        Event::GatewayResponse {
            request_id,
            status,
            body,
            error,
        } => {
            let result = match error {
                Some(message) => Err(GatewayError::Lcu(message)),
                None => Ok(LcuResponse {
                    status: status.unwrap_or(200),
                    body,
                }),
            };
            app.gateway.complete(request_id, result);
        }
    }

    Ok(())
}

/// Pushes a frame to every locally connected session
fn push_all_local(app: &AppState, frame: ServerFrame) {
    for summoner_name in app.registry.list_local() {
        if let Some(handle) = app.registry.lookup_local(&summoner_name) {
            handle.push(frame.clone());
        }
    }
}

/// Pushes a frame to the locally connected participants of a match
async fn push_participants(
    app: &AppState,
    match_id: MatchId,
    frame: ServerFrame,
) -> Result<(), DbErr> {
    let Some(model) = Match::by_id(&app.db, match_id).await? else {
        return Ok(());
    };
    for summoner_name in model.participants() {
        if let Some(handle) = app.registry.lookup_local(summoner_name) {
            handle.push(frame.clone());
        }
    }
    Ok(())
}

/// Cancellation reaches the roster and the removed at-fault players
/// who are no longer on it
async fn push_participants_and_faulted(
    app: &AppState,
    match_id: MatchId,
    frame: ServerFrame,
    at_fault: &[String],
) -> Result<(), DbErr> {
    push_participants(app, match_id, frame.clone()).await?;
    for summoner_name in at_fault {
        if let Some(handle) = app.registry.lookup_local(summoner_name) {
            handle.push(frame.clone());
        }
    }
    Ok(())
}

/// The match found push carries each player's own lane and the
/// acceptance deadline
async fn notify_match_found(app: &AppState, match_id: MatchId) -> Result<(), DbErr> {
    let Some(model) = Match::by_id(&app.db, match_id).await? else {
        return Ok(());
    };
    let deadline = model.created_at
        + chrono::Duration::seconds(app.config.acceptance.timeout_seconds as i64);

    for (team, roster) in [(1, &model.team1_players.0), (2, &model.team2_players.0)] {
        for (slot, summoner_name) in roster.iter().enumerate() {
            let Some(handle) = app.registry.lookup_local(summoner_name) else {
                continue;
            };
            handle.push(ServerFrame::MatchFound {
                match_id,
                team1: model.team1_players.0.clone(),
                team2: model.team2_players.0.clone(),
                your_team: team,
                your_lane: crate::database::entities::Lane::SLOTS[slot],
                deadline,
            });
        }
    }
    Ok(())
}

/// Performs a forwarded gateway call against a locally connected
/// summoner and answers on the bus. Instances without the session
/// stay silent
async fn answer_gateway_request(
    app: &AppState,
    request_id: ulid::Ulid,
    summoner_name: &str,
    method: &str,
    path: &str,
    body: Option<serde_json::Value>,
) {
    let Some(handle) = app.registry.lookup_local(summoner_name) else {
        return;
    };

    let result = app
        .gateway
        .request_local(handle, method, path, body)
        .await;

    let response = match result {
        Ok(response) => Event::GatewayResponse {
            request_id,
            status: Some(response.status),
            body: response.body,
            error: None,
        },
        Err(err) => Event::GatewayResponse {
            request_id,
            status: None,
            body: None,
            error: Some(err.to_string()),
        },
    };

    if let Err(err) = app.bus.publish(response).await {
        warn!("Failed to answer forwarded gateway request: {err}");
    }
}
