//! Shared application state assembled once at startup and passed to
//! every component by reference.

use crate::{
    config::Config,
    services::{
        events::EventBus, gateway::Gateway, ownership::Ownership, registry::SessionRegistry,
        runner::ActiveMatches, votes::VoteWeights,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub struct App {
    /// Identity of this server process within the fleet
    pub instance_id: String,
    pub config: Config,
    pub db: DatabaseConnection,
    pub bus: EventBus,
    pub registry: SessionRegistry,
    pub gateway: Gateway,
    pub ownership: Ownership,
    /// Matches currently driven by this instance
    pub active_matches: ActiveMatches,
    /// Immutable link vote weight table
    pub vote_weights: VoteWeights,
}

pub type AppState = Arc<App>;
