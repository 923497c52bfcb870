//! Session registry. Single source of truth for which instance holds
//! which summoner's connection. Redis carries the shared entries with
//! a TTL, the handles of locally connected sessions live in memory.

use crate::session::SessionHandle;
use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::Mutex;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// TTL for session keys, refreshed on every heartbeat
const SESSION_TTL_SECS: u64 = 90;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Redis could not be reached, registration must not proceed
    #[error("Session registry unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),
    #[error("Malformed registry entry: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Shared registry entry stored under `session:<name>`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub instance_id: String,
    pub connection_id: Uuid,
    pub identified_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

/// Result of a registry lookup. `stale` marks answers served from
/// the local cache while Redis was unreachable
#[derive(Debug, Clone)]
pub struct Lookup {
    pub entry: Option<SessionEntry>,
    pub stale: bool,
}

/// Local game client credentials advertised by a gateway, kept so
/// the REST facade can rebind them without a reconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LcuBinding {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub auth_token: String,
}

pub struct SessionRegistry {
    instance_id: String,
    connection: ConnectionManager,
    /// Handles of summoners connected to this instance
    local: Mutex<HashMap<String, SessionHandle>>,
    /// Last successful lookups, served stale during Redis outages
    cache: Mutex<HashMap<String, SessionEntry>>,
    /// Advertised client credentials of local sessions
    lcu: Mutex<HashMap<String, LcuBinding>>,
}

fn session_key(summoner_name: &str) -> String {
    format!("session:{}", summoner_name.to_lowercase())
}

impl SessionRegistry {
    pub fn new(instance_id: String, connection: ConnectionManager) -> Self {
        Self {
            instance_id,
            connection,
            local: Default::default(),
            cache: Default::default(),
            lcu: Default::default(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Claims the summoner's session for this instance. Returns the
    /// displaced entry when another instance previously held it so
    /// the caller can broadcast the invalidation
    pub async fn register(
        &self,
        summoner_name: &str,
        handle: SessionHandle,
    ) -> Result<Option<SessionEntry>, RegistryError> {
        let key = session_key(summoner_name);
        let mut connection = self.connection.clone();

        let previous: Option<String> = connection.get(&key).await?;
        let previous: Option<SessionEntry> =
            previous.and_then(|value| serde_json::from_str(&value).ok());

        let now = Utc::now();
        let entry = SessionEntry {
            instance_id: self.instance_id.clone(),
            connection_id: handle.connection_id,
            identified_at: now,
            last_heartbeat: now,
        };
        let payload = serde_json::to_string(&entry)?;
        let _: () = connection.set_ex(&key, payload, SESSION_TTL_SECS).await?;

        let name = summoner_name.to_lowercase();

        // A second connection for the same summoner on this instance
        // invalidates the first directly
        let displaced_local = {
            let mut local = self.local.lock();
            let displaced = local
                .get(&name)
                .filter(|existing| existing.connection_id != handle.connection_id)
                .cloned();
            local.insert(name.clone(), handle);
            displaced
        };
        if let Some(stale) = displaced_local {
            stale.close_duplicate();
        }

        self.cache.lock().insert(name, entry);

        Ok(previous.filter(|entry| entry.instance_id != self.instance_id))
    }

    /// Best-effort removal, only deletes when the entry still belongs
    /// to this connection
    pub async fn unregister(&self, summoner_name: &str, connection_id: Uuid) {
        let name = summoner_name.to_lowercase();

        {
            let mut local = self.local.lock();
            if local
                .get(&name)
                .is_some_and(|handle| handle.connection_id == connection_id)
            {
                local.remove(&name);
            }
        }

        let key = session_key(&name);
        let mut connection = self.connection.clone();
        let current: Result<Option<String>, _> = connection.get(&key).await;
        if let Ok(Some(value)) = current {
            if let Ok(entry) = serde_json::from_str::<SessionEntry>(&value) {
                if entry.instance_id == self.instance_id && entry.connection_id == connection_id {
                    let deleted: Result<(), _> = connection.del(&key).await;
                    if let Err(err) = deleted {
                        warn!("Failed to delete session key for {name}: {err}");
                    }
                }
            }
        }
    }

    /// Bumps the TTL and heartbeat timestamp of a local session
    pub async fn heartbeat(&self, summoner_name: &str) {
        let name = summoner_name.to_lowercase();
        let entry = {
            let connection_id = match self.local.lock().get(&name) {
                Some(handle) => handle.connection_id,
                None => return,
            };
            let identified_at = self
                .cache
                .lock()
                .get(&name)
                .map(|entry| entry.identified_at)
                .unwrap_or_else(Utc::now);
            SessionEntry {
                instance_id: self.instance_id.clone(),
                connection_id,
                identified_at,
                last_heartbeat: Utc::now(),
            }
        };

        let payload = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(_) => return,
        };
        let mut connection = self.connection.clone();
        let result: Result<(), _> = connection
            .set_ex(session_key(&name), payload, SESSION_TTL_SECS)
            .await;
        if let Err(err) = result {
            warn!("Session heartbeat failed for {name}: {err}");
        }
    }

    /// Looks up where the summoner is connected. Falls back onto the
    /// cached entry marked stale when Redis is unreachable
    pub async fn lookup(&self, summoner_name: &str) -> Result<Lookup, RegistryError> {
        let name = summoner_name.to_lowercase();
        let mut connection = self.connection.clone();

        match connection.get::<_, Option<String>>(session_key(&name)).await {
            Ok(value) => {
                let entry = match value {
                    Some(raw) => Some(serde_json::from_str::<SessionEntry>(&raw)?),
                    None => None,
                };
                let mut cache = self.cache.lock();
                match &entry {
                    Some(entry) => {
                        cache.insert(name, entry.clone());
                    }
                    None => {
                        cache.remove(&name);
                    }
                }
                Ok(Lookup {
                    entry,
                    stale: false,
                })
            }
            Err(err) => {
                warn!("Registry lookup degraded for {name}: {err}");
                Ok(Lookup {
                    entry: self.cache.lock().get(&name).cloned(),
                    stale: true,
                })
            }
        }
    }

    /// Handle of a summoner connected to this instance
    pub fn lookup_local(&self, summoner_name: &str) -> Option<SessionHandle> {
        self.local
            .lock()
            .get(&summoner_name.to_lowercase())
            .cloned()
    }

    /// Names currently connected to this instance
    pub fn list_local(&self) -> Vec<String> {
        self.local.lock().keys().cloned().collect()
    }

    /// Drops the local handle for an invalidated session, returning
    /// it so the caller can close the connection
    pub fn take_local(&self, summoner_name: &str) -> Option<SessionHandle> {
        self.local.lock().remove(&summoner_name.to_lowercase())
    }

    /// Stores the game client credentials a gateway advertised
    pub fn set_lcu_binding(&self, summoner_name: &str, binding: LcuBinding) {
        self.lcu
            .lock()
            .insert(summoner_name.to_lowercase(), binding);
    }

    pub fn lcu_binding(&self, summoner_name: &str) -> Option<LcuBinding> {
        self.lcu.lock().get(&summoner_name.to_lowercase()).cloned()
    }

    pub fn clear_lcu_binding(&self, summoner_name: &str) {
        self.lcu.lock().remove(&summoner_name.to_lowercase());
    }
}
