//! Frame model for the duplex client connection. Frames are JSON
//! text messages tagged by `type` with camelCase fields.

use crate::{
    database::entities::{Lane, Player},
    services::events::QueueEntry,
    utils::types::{LcuGameId, MatchId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use ulid::Ulid;

/// Frames sent by the desktop companion
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Mandatory first frame of every connection
    #[serde(rename_all = "camelCase")]
    Identify {
        game_name: String,
        tag_line: String,
        #[serde(default)]
        summoner_name: Option<String>,
        #[serde(default)]
        puuid: Option<String>,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        profile_icon_id: Option<i32>,
        #[serde(default)]
        lcu_info: Option<Value>,
    },
    /// Advertises that this connection can serve LCU calls for the
    /// summoner
    #[serde(rename_all = "camelCase")]
    RegisterLcuConnection {
        summoner_name: String,
        port: u16,
        auth_token: String,
        protocol: String,
        #[serde(default)]
        profile_icon_id: Option<i32>,
        #[serde(default)]
        puuid: Option<String>,
        #[serde(default)]
        summoner_id: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    LcuResponse {
        id: Ulid,
        status: u16,
        #[serde(default)]
        body: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    LcuError { id: Ulid, error: String },
    #[serde(rename_all = "camelCase")]
    JoinQueue {
        primary_lane: Lane,
        secondary_lane: Lane,
    },
    LeaveQueue,
    #[serde(rename_all = "camelCase")]
    AcceptMatch { match_id: MatchId },
    #[serde(rename_all = "camelCase")]
    DeclineMatch { match_id: MatchId },
    #[serde(rename_all = "camelCase")]
    DraftAction {
        match_id: MatchId,
        index: u32,
        champion_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    DraftEdit {
        match_id: MatchId,
        index: u32,
        champion_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    DraftConfirm { match_id: MatchId },
    #[serde(rename_all = "camelCase")]
    VoteForMatch {
        match_id: MatchId,
        lcu_game_id: LcuGameId,
    },
    #[serde(rename_all = "camelCase")]
    MuteSpectator { match_id: MatchId, target: String },
    #[serde(rename_all = "camelCase")]
    Pong {
        #[serde(default)]
        ts: Option<i64>,
    },
}

/// Frames pushed to the desktop companion
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Acknowledges a successful identify
    #[serde(rename_all = "camelCase")]
    Identified { player: Player },
    /// Error scoped to the sending player's last frame
    #[serde(rename_all = "camelCase")]
    Error { code: ErrorCode, message: String },
    #[serde(rename_all = "camelCase")]
    Ping { ts: i64 },
    #[serde(rename_all = "camelCase")]
    QueueUpdate {
        players_in_queue: u64,
        players: Vec<QueueEntry>,
    },
    #[serde(rename_all = "camelCase")]
    QueuePlayerJoined { summoner_name: String },
    #[serde(rename_all = "camelCase")]
    QueuePlayerLeft { summoner_name: String },
    /// Sent to each participant with their own lane assignment
    #[serde(rename_all = "camelCase")]
    MatchFound {
        match_id: MatchId,
        team1: Vec<String>,
        team2: Vec<String>,
        your_team: i32,
        your_lane: Lane,
        deadline: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    AcceptanceUpdate {
        match_id: MatchId,
        accepted: u32,
        total: u32,
    },
    #[serde(rename_all = "camelCase")]
    MatchCancelled {
        match_id: MatchId,
        at_fault: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    DraftStarted { match_id: MatchId },
    #[serde(rename_all = "camelCase")]
    DraftUpdate {
        match_id: MatchId,
        update: DraftUpdateKind,
        index: u32,
        by_player: String,
        champion_id: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    DraftCompleted { match_id: MatchId },
    #[serde(rename_all = "camelCase")]
    GameStarted { match_id: MatchId },
    /// The real game finished, the link vote modal opens
    #[serde(rename_all = "camelCase")]
    GameEnded { match_id: MatchId },
    #[serde(rename_all = "camelCase")]
    VoteUpdate {
        match_id: MatchId,
        votes: BTreeMap<LcuGameId, u32>,
    },
    #[serde(rename_all = "camelCase")]
    GameLinked {
        match_id: MatchId,
        riot_game_id: LcuGameId,
        winner_team: i32,
    },
    #[serde(rename_all = "camelCase")]
    SpectatorMuted {
        match_id: MatchId,
        summoner_name: String,
        target: String,
    },
    /// Asks the gateway to perform a local client call
    #[serde(rename_all = "camelCase")]
    LcuRequest {
        id: Ulid,
        method: String,
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftUpdateKind {
    Pick,
    Ban,
    Edit,
}

/// Error codes reported back to a player's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    InvalidInput,
    AlreadyQueued,
    AlreadyInMatch,
    InvalidLane,
    NotYourTurn,
    ChampionAlreadyUsed,
    WrongInstance,
    GatewayDisconnected,
    RegistryUnavailable,
    StoreUnavailable,
    BroadcastFailed,
    NotParticipant,
    MatchNotFound,
    IdentifyExpected,
    DuplicateSession,
}

#[cfg(test)]
mod test {
    use super::{ClientFrame, DraftUpdateKind, ErrorCode, ServerFrame};

    #[test]
    fn client_frames_parse_camel_case_payloads() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"draft_action","matchId":3,"index":6,"championId":17}"#,
        )
        .unwrap();
        match frame {
            ClientFrame::DraftAction {
                match_id,
                index,
                champion_id,
            } => {
                assert_eq!((match_id, index, champion_id), (3, 6, 17));
            }
            other => panic!("wrong frame {other:?}"),
        }
    }

    #[test]
    fn lane_alias_is_accepted_in_frames() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"join_queue","primaryLane":"adc","secondaryLane":"fill"}"#,
        )
        .unwrap();
        match frame {
            ClientFrame::JoinQueue { primary_lane, .. } => {
                assert_eq!(
                    serde_json::to_string(&primary_lane).unwrap(),
                    "\"bot\""
                );
            }
            other => panic!("wrong frame {other:?}"),
        }
    }

    #[test]
    fn server_frames_are_tagged() {
        let frame = ServerFrame::DraftUpdate {
            match_id: 9,
            update: DraftUpdateKind::Pick,
            index: 6,
            by_player: "a#t".to_string(),
            champion_id: Some(17),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "draft_update");
        assert_eq!(json["update"], "pick");
        assert_eq!(json["championId"], 17);
    }

    #[test]
    fn error_codes_serialize_as_pascal_case() {
        let json = serde_json::to_value(ErrorCode::ChampionAlreadyUsed).unwrap();
        assert_eq!(json, "ChampionAlreadyUsed");
    }
}
