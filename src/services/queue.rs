//! Queue manager. Owns the `queue_players` rows, feeds the match
//! builder on every wake and broadcasts queue changes.

use crate::{
    database::entities::{
        matches, AcceptanceStatus, Lane, Match, PickBanData, Player, PlayerList, QueuePlayer,
        QueueSnapshot, SnapshotPlayer,
    },
    services::{
        builder,
        draft,
        events::{Event, EventsError, QueueEntry},
    },
    state::App,
    utils::types::MatchId,
};
use chrono::Utc;
use log::{debug, info};
use sea_orm::{DbErr, TransactionTrait};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Already queued")]
    AlreadyQueued,
    #[error("Already in an active match")]
    AlreadyInMatch,
    #[error("Primary and secondary lane must differ")]
    InvalidLane,
    /// The summoner has never identified with this server
    #[error("Unknown player")]
    UnknownPlayer,
    #[error(transparent)]
    Store(#[from] DbErr),
    #[error(transparent)]
    Broadcast(#[from] EventsError),
}

/// Queue status surface for the UI
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub players_in_queue: u64,
    pub players: Vec<QueueEntry>,
    pub estimated_wait_seconds: u64,
    pub is_active: bool,
}

/// Admits a summoner into the queue. Wakes the builder before
/// returning so a tenth join forms the match immediately
pub async fn join(
    app: &App,
    summoner_name: &str,
    primary_lane: Lane,
    secondary_lane: Lane,
) -> Result<QueuePlayer, QueueError> {
    if primary_lane == secondary_lane && primary_lane != Lane::Fill {
        return Err(QueueError::InvalidLane);
    }

    let player = Player::by_name(&app.db, summoner_name)
        .await?
        .ok_or(QueueError::UnknownPlayer)?;

    if QueuePlayer::by_name(&app.db, summoner_name).await?.is_some() {
        return Err(QueueError::AlreadyQueued);
    }

    if Match::active_for_summoner(&app.db, summoner_name)
        .await?
        .is_some()
    {
        return Err(QueueError::AlreadyInMatch);
    }

    let row = match QueuePlayer::create(&app.db, &player, primary_lane, secondary_lane, Utc::now())
        .await
    {
        Ok(value) => value,
        // A concurrent join on another instance may win the unique
        // index between our check and the insert
        Err(err) => {
            if QueuePlayer::by_name(&app.db, summoner_name).await?.is_some() {
                return Err(QueueError::AlreadyQueued);
            }
            return Err(err.into());
        }
    };

    debug!("Player joined queue: {}", row.summoner_name);

    app.bus
        .publish(Event::QueuePlayerJoined {
            summoner_name: row.summoner_name.clone(),
        })
        .await?;
    broadcast_queue_update(app).await?;

    process(app).await?;

    Ok(row)
}

/// Removes the summoner from the queue. Idempotent, leaving twice or
/// while not queued succeeds silently
pub async fn leave(app: &App, summoner_name: &str) -> Result<(), QueueError> {
    let removed = QueuePlayer::remove_by_name(&app.db, summoner_name).await?;
    if !removed {
        return Ok(());
    }

    debug!("Player left queue: {summoner_name}");

    app.bus
        .publish(Event::QueuePlayerLeft {
            summoner_name: summoner_name.to_lowercase(),
        })
        .await?;
    broadcast_queue_update(app).await?;

    Ok(())
}

pub async fn status(app: &App) -> Result<QueueStatus, QueueError> {
    let rows = QueuePlayer::all_active(&app.db).await?;
    let players_in_queue = rows.len() as u64;

    // Rough wait guess from the missing players at thirty seconds
    // per expected join
    let missing = (app.config.queue.match_size as u64).saturating_sub(players_in_queue);
    let estimated_wait_seconds = missing * 30;

    Ok(QueueStatus {
        players_in_queue,
        players: rows.iter().map(queue_entry).collect(),
        estimated_wait_seconds,
        is_active: true,
    })
}

/// Builder wake. Keeps forming matches while enough eligible players
/// remain and the builder does not defer
pub async fn process(app: &App) -> Result<Vec<MatchId>, QueueError> {
    let mut formed = Vec::new();
    while let Some(match_id) = form_one(app).await? {
        formed.push(match_id);
    }
    Ok(formed)
}

/// Consults the match builder against the active rows and persists
/// any formed match in one transaction with the queue row deletion,
/// then announces it
async fn form_one(app: &App) -> Result<Option<MatchId>, QueueError> {
    let rows = QueuePlayer::all_active(&app.db).await?;

    let candidate = match builder::build_match(&rows, &app.config.queue) {
        Some(value) => value,
        None => return Ok(None),
    };

    let consumed_ids: Vec<i32> = candidate
        .team1
        .iter()
        .chain(candidate.team2.iter())
        .map(|row| row.id)
        .collect();
    let consumed_count = consumed_ids.len() as u64;

    let team1_names: Vec<String> = candidate
        .team1
        .iter()
        .map(|row| row.summoner_name.clone())
        .collect();
    let team2_names: Vec<String> = candidate
        .team2
        .iter()
        .map(|row| row.summoner_name.clone())
        .collect();

    let snapshot = QueueSnapshot {
        players: candidate
            .team1
            .iter()
            .chain(candidate.team2.iter())
            .map(snapshot_player)
            .collect(),
    };
    let pick_ban: PickBanData = draft::create_pick_ban(&team1_names, &team2_names, Utc::now());

    let txn = app.db.begin().await?;

    // Another instance may have consumed some of these rows already,
    // in that case the whole formation is abandoned
    let deleted = QueuePlayer::delete_ids(&txn, consumed_ids).await?;
    if deleted.rows_affected != consumed_count {
        txn.rollback().await?;
        return Ok(None);
    }

    let created: matches::Model = Match::create_found(
        &txn,
        PlayerList(team1_names),
        PlayerList(team2_names),
        candidate.average_mmr_team1,
        candidate.average_mmr_team2,
        snapshot,
        pick_ban,
    )
    .await?;

    txn.commit().await?;

    info!(
        "Match formed (id: {}, mmr {} vs {}, autofills: {})",
        created.id, created.average_mmr_team1, created.average_mmr_team2, candidate.cost.autofills
    );

    app.bus
        .publish(Event::MatchFound {
            match_id: created.id,
        })
        .await?;
    broadcast_queue_update(app).await?;

    Ok(Some(created.id))
}

/// Publishes the current queue composition
pub async fn broadcast_queue_update(app: &App) -> Result<(), QueueError> {
    let rows = QueuePlayer::all_active(&app.db).await?;
    app.bus
        .publish(Event::QueueUpdate {
            players_in_queue: rows.len() as u64,
            players: rows.iter().map(queue_entry).collect(),
        })
        .await?;
    Ok(())
}

fn queue_entry(row: &QueuePlayer) -> QueueEntry {
    QueueEntry {
        summoner_name: row.summoner_name.clone(),
        primary_lane: row.primary_lane,
        secondary_lane: row.secondary_lane,
        join_time: row.join_time,
    }
}

fn snapshot_player(row: &QueuePlayer) -> SnapshotPlayer {
    SnapshotPlayer {
        player_id: row.player_id,
        summoner_name: row.summoner_name.clone(),
        region: row.region.clone(),
        custom_lp: row.custom_lp,
        primary_lane: row.primary_lane,
        secondary_lane: row.secondary_lane,
        join_time: row.join_time,
        acceptance_status: AcceptanceStatus::Pending,
    }
}
