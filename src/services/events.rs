//! Cross-instance event bus. One Redis pub/sub channel per event
//! kind, every instance subscribes to all of them. Publishing also
//! hands the event straight to the local dispatcher, the looped back
//! copy from Redis is dropped by the inbox dedupe.

use crate::utils::types::{LcuGameId, MatchId};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use ulid::Ulid;

/// Channels the subscriber loop listens on, one per event kind
pub const TOPICS: &[&str] = &[
    "queue.update",
    "queue.player_joined",
    "queue.player_left",
    "match.found",
    "match.acceptance",
    "match.cancelled",
    "draft.started",
    "draft.pick",
    "draft.ban",
    "draft.edit",
    "draft.completed",
    "game.started",
    "game.ended",
    "game.vote",
    "game.linked",
    "spectator.muted",
    "session.invalidated",
    "gateway.request",
    "gateway.response",
];

/// Capacity of the local fan-in channel feeding the dispatcher
const LOCAL_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum EventsError {
    /// The pub/sub layer rejected the publish, the caller must not
    /// treat the triggering operation as committed
    #[error("Broadcast failed: {0}")]
    BroadcastFailed(#[from] redis::RedisError),
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Wire form of a bus event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Ulid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// Typed event payloads. The tag doubles as the pub/sub channel name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum Event {
    #[serde(rename = "queue.update", rename_all = "camelCase")]
    QueueUpdate {
        players_in_queue: u64,
        players: Vec<QueueEntry>,
    },
    #[serde(rename = "queue.player_joined", rename_all = "camelCase")]
    QueuePlayerJoined { summoner_name: String },
    #[serde(rename = "queue.player_left", rename_all = "camelCase")]
    QueuePlayerLeft { summoner_name: String },
    #[serde(rename = "match.found", rename_all = "camelCase")]
    MatchFound { match_id: MatchId },
    #[serde(rename = "match.acceptance", rename_all = "camelCase")]
    MatchAcceptance {
        match_id: MatchId,
        summoner_name: String,
        accepted: u32,
        total: u32,
    },
    #[serde(rename = "match.cancelled", rename_all = "camelCase")]
    MatchCancelled {
        match_id: MatchId,
        at_fault: Vec<String>,
    },
    #[serde(rename = "draft.started", rename_all = "camelCase")]
    DraftStarted { match_id: MatchId },
    #[serde(rename = "draft.pick", rename_all = "camelCase")]
    DraftPick {
        match_id: MatchId,
        index: u32,
        by_player: String,
        champion_id: Option<u32>,
    },
    #[serde(rename = "draft.ban", rename_all = "camelCase")]
    DraftBan {
        match_id: MatchId,
        index: u32,
        by_player: String,
        champion_id: Option<u32>,
    },
    #[serde(rename = "draft.edit", rename_all = "camelCase")]
    DraftEdit {
        match_id: MatchId,
        index: u32,
        by_player: String,
        champion_id: u32,
    },
    #[serde(rename = "draft.completed", rename_all = "camelCase")]
    DraftCompleted { match_id: MatchId },
    #[serde(rename = "game.started", rename_all = "camelCase")]
    GameStarted { match_id: MatchId },
    #[serde(rename = "game.ended", rename_all = "camelCase")]
    GameEnded {
        match_id: MatchId,
        reported_by: String,
    },
    #[serde(rename = "game.vote", rename_all = "camelCase")]
    GameVote {
        match_id: MatchId,
        summoner_name: String,
        lcu_game_id: LcuGameId,
    },
    #[serde(rename = "game.linked", rename_all = "camelCase")]
    GameLinked {
        match_id: MatchId,
        riot_game_id: LcuGameId,
        winner_team: i32,
    },
    #[serde(rename = "spectator.muted", rename_all = "camelCase")]
    SpectatorMuted {
        match_id: MatchId,
        summoner_name: String,
        target: String,
    },
    /// A newer connection claimed the summoner's session, the named
    /// instance must drop its stale connection
    #[serde(rename = "session.invalidated", rename_all = "camelCase")]
    SessionInvalidated {
        summoner_name: String,
        instance_id: String,
    },
    /// Gateway call for a summoner connected to another instance
    #[serde(rename = "gateway.request", rename_all = "camelCase")]
    GatewayRequest {
        request_id: Ulid,
        summoner_name: String,
        method: String,
        path: String,
        body: Option<Value>,
    },
    #[serde(rename = "gateway.response", rename_all = "camelCase")]
    GatewayResponse {
        request_id: Ulid,
        status: Option<u16>,
        body: Option<Value>,
        error: Option<String>,
    },
}

/// Lightweight queue listing included in queue updates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub summoner_name: String,
    pub primary_lane: crate::database::entities::Lane,
    pub secondary_lane: crate::database::entities::Lane,
    pub join_time: DateTime<Utc>,
}

impl Event {
    /// The pub/sub channel this event is published on
    pub fn topic(&self) -> &'static str {
        match self {
            Event::QueueUpdate { .. } => "queue.update",
            Event::QueuePlayerJoined { .. } => "queue.player_joined",
            Event::QueuePlayerLeft { .. } => "queue.player_left",
            Event::MatchFound { .. } => "match.found",
            Event::MatchAcceptance { .. } => "match.acceptance",
            Event::MatchCancelled { .. } => "match.cancelled",
            Event::DraftStarted { .. } => "draft.started",
            Event::DraftPick { .. } => "draft.pick",
            Event::DraftBan { .. } => "draft.ban",
            Event::DraftEdit { .. } => "draft.edit",
            Event::DraftCompleted { .. } => "draft.completed",
            Event::GameStarted { .. } => "game.started",
            Event::GameEnded { .. } => "game.ended",
            Event::GameVote { .. } => "game.vote",
            Event::GameLinked { .. } => "game.linked",
            Event::SpectatorMuted { .. } => "spectator.muted",
            Event::SessionInvalidated { .. } => "session.invalidated",
            Event::GatewayRequest { .. } => "gateway.request",
            Event::GatewayResponse { .. } => "gateway.response",
        }
    }
}

/// Publisher half of the bus plus the local fan-in channel
pub struct EventBus {
    connection: ConnectionManager,
    local: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(connection: ConnectionManager) -> Self {
        let (local, _) = broadcast::channel(LOCAL_CHANNEL_CAPACITY);
        Self { connection, local }
    }

    /// Receiver of every event reaching this instance, both locally
    /// published and delivered through Redis
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.local.subscribe()
    }

    /// Sender used by the subscriber loop to inject remote events
    pub fn local_sender(&self) -> broadcast::Sender<EventEnvelope> {
        self.local.clone()
    }

    /// Publishes the event across instances. Local processing happens
    /// unconditionally once the broadcast is accepted, a failed
    /// publish is surfaced to the caller untouched
    pub async fn publish(&self, event: Event) -> Result<Ulid, EventsError> {
        let envelope = EventEnvelope {
            event_id: Ulid::new(),
            timestamp: Utc::now(),
            event,
        };
        let payload = serde_json::to_string(&envelope)?;
        let topic = envelope.event.topic();

        let mut connection = self.connection.clone();
        let _: i64 = connection.publish(topic, payload).await?;

        debug!("Published event {} ({})", topic, envelope.event_id);

        // Mandatory self delivery, the Redis loopback copy is dropped
        // later by the inbox dedupe
        _ = self.local.send(envelope.clone());

        Ok(envelope.event_id)
    }
}

/// Subscriber loop forwarding Redis deliveries into the local
/// channel. Reconnects with a delay when the connection drops
pub async fn listen(client: redis::Client, local: broadcast::Sender<EventEnvelope>) {
    use futures_util::StreamExt;

    loop {
        let mut pubsub = match client.get_async_pubsub().await {
            Ok(value) => value,
            Err(err) => {
                warn!("Event bus subscriber unavailable: {err}");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        if let Err(err) = pubsub.subscribe(TOPICS).await {
            warn!("Failed to subscribe event topics: {err}");
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            continue;
        }

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            let payload: String = match message.get_payload() {
                Ok(value) => value,
                Err(err) => {
                    warn!("Unreadable event payload: {err}");
                    continue;
                }
            };

            // Unknown event kinds are logged and discarded
            match serde_json::from_str::<EventEnvelope>(&payload) {
                Ok(envelope) => {
                    _ = local.send(envelope);
                }
                Err(err) => {
                    warn!("Discarding unknown event: {err}");
                }
            }
        }

        warn!("Event bus subscription lost, reconnecting");
    }
}

#[cfg(test)]
mod test {
    use super::{Event, EventEnvelope};
    use chrono::Utc;
    use ulid::Ulid;

    #[test]
    fn envelope_tag_matches_topic() {
        let envelope = EventEnvelope {
            event_id: Ulid::new(),
            timestamp: Utc::now(),
            event: Event::MatchFound { match_id: 7 },
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["eventType"], "match.found");
        assert_eq!(json["matchId"], 7);
        assert!(json["eventId"].is_string());
    }

    #[test]
    fn unknown_event_kinds_fail_to_decode() {
        let payload = r#"{
            "eventId": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "timestamp": "2025-06-01T12:00:00Z",
            "eventType": "queue.reshuffle",
            "matchId": 1
        }"#;
        assert!(serde_json::from_str::<EventEnvelope>(payload).is_err());
    }
}
