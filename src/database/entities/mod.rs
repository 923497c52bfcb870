pub mod event_inbox;
pub mod match_votes;
pub mod matches;
pub mod players;
pub mod queue_players;
pub mod settings;

pub type Player = players::Model;
pub type QueuePlayer = queue_players::Model;
pub type Match = matches::Model;
pub type MatchVote = match_votes::Model;

pub use matches::{
    DraftAction, DraftActionKind, DraftActionStatus, DraftPhase, MatchStatus, PickBanData,
    PlayerList, QueueSnapshot, SnapshotPlayer, TeamSide,
};
pub use queue_players::{AcceptanceStatus, Lane};
