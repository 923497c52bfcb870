//! Match ownership leases. The conditional update on the match row is
//! the source of truth, the Redis key with its TTL is only a hint for
//! other instances.

use crate::{
    config::OwnershipConfig,
    database::{entities::Match, DbResult},
    utils::types::MatchId,
};
use log::warn;
use redis::{aio::ConnectionManager, AsyncCommands};
use sea_orm::DatabaseConnection;
use std::time::Duration;

/// TTL of the `match:<id>:owner` hint key
const LEASE_HINT_TTL_SECS: u64 = 60;

fn owner_key(match_id: MatchId) -> String {
    format!("match:{match_id}:owner")
}

pub struct Ownership {
    instance_id: String,
    db: DatabaseConnection,
    redis: ConnectionManager,
    stale_cutoff: chrono::Duration,
    heartbeat: Duration,
}

impl Ownership {
    pub fn new(
        instance_id: String,
        db: DatabaseConnection,
        redis: ConnectionManager,
        config: &OwnershipConfig,
    ) -> Self {
        Self {
            instance_id,
            db,
            redis,
            stale_cutoff: chrono::Duration::seconds(config.stale_cutoff_seconds as i64),
            heartbeat: Duration::from_secs(config.heartbeat_seconds),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Interval at which the owner refreshes its lease
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat
    }

    /// Attempts to become the driver of the match. Exactly one
    /// instance's row update succeeds, winning also refreshes the
    /// Redis hint
    pub async fn claim(&self, match_id: MatchId) -> DbResult<bool> {
        let won =
            Match::claim_ownership(&self.db, match_id, &self.instance_id, self.stale_cutoff)
                .await?;
        if won {
            self.write_hint(match_id).await;
        }
        Ok(won)
    }

    /// Refreshes the lease, false means it was lost and the caller
    /// must stop driving the match
    pub async fn refresh(&self, match_id: MatchId) -> DbResult<bool> {
        let kept = Match::refresh_ownership(&self.db, match_id, &self.instance_id).await?;
        if kept {
            self.write_hint(match_id).await;
        }
        Ok(kept)
    }

    /// Drops the Redis hint once a match reaches a terminal state.
    /// The row itself is released by the terminal update
    pub async fn clear_hint(&self, match_id: MatchId) {
        let mut redis = self.redis.clone();
        let result: Result<(), _> = redis.del(owner_key(match_id)).await;
        if let Err(err) = result {
            warn!("Failed to clear ownership hint for match {match_id}: {err}");
        }
    }

    /// The instance the hint currently names, purely advisory
    pub async fn hint(&self, match_id: MatchId) -> Option<String> {
        let mut redis = self.redis.clone();
        redis.get(owner_key(match_id)).await.ok().flatten()
    }

    async fn write_hint(&self, match_id: MatchId) {
        let mut redis = self.redis.clone();
        let result: Result<(), _> = redis
            .set_ex(
                owner_key(match_id),
                self.instance_id.clone(),
                LEASE_HINT_TTL_SECS,
            )
            .await;
        if let Err(err) = result {
            warn!("Failed to write ownership hint for match {match_id}: {err}");
        }
    }
}
