//! Server initiated RPC against the desktop gateway of a player.
//! Calls for locally connected summoners are pushed straight down the
//! session, remote holders are reached through the event bus with the
//! same correlation table completing on the response event.

use crate::{
    services::{
        events::{Event, EventBus, EventsError},
        registry::{RegistryError, SessionRegistry},
    },
    session::models::ServerFrame,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tokio::sync::oneshot;
use ulid::Ulid;
use uuid::Uuid;

/// Time an LCU request may stay unanswered
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The owning connection dropped while requests were pending
    #[error("Gateway disconnected")]
    Disconnected,
    #[error("Gateway request timed out")]
    Timeout,
    /// The summoner has no live session anywhere
    #[error("Player is not connected")]
    Offline,
    /// The gateway reported a local client error
    #[error("LCU error: {0}")]
    Lcu(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Broadcast(#[from] EventsError),
}

/// Result of a gateway call
#[derive(Debug, Clone)]
pub struct LcuResponse {
    pub status: u16,
    pub body: Option<Value>,
}

struct PendingRpc {
    sender: oneshot::Sender<Result<LcuResponse, GatewayError>>,
    /// Local connection serving this request, `None` for requests
    /// awaiting a response event from another instance
    connection_id: Option<Uuid>,
}

/// Correlation table of in-flight gateway calls
#[derive(Default)]
pub struct Gateway {
    pending: Mutex<HashMap<Ulid, PendingRpc>>,
}

impl Gateway {
    /// Performs an LCU call through the summoner's gateway wherever
    /// their session lives
    pub async fn request(
        &self,
        registry: &SessionRegistry,
        bus: &EventBus,
        summoner_name: &str,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<LcuResponse, GatewayError> {
        if let Some(handle) = registry.lookup_local(summoner_name) {
            return self.request_local(handle, method, path, body).await;
        }

        let request_id = Ulid::new();
        let receiver = {
            let lookup = registry.lookup(summoner_name).await?;
            if lookup.entry.is_none() {
                return Err(GatewayError::Offline);
            }

            let receiver = self.register(request_id, None);
            bus.publish(Event::GatewayRequest {
                request_id,
                summoner_name: summoner_name.to_lowercase(),
                method: method.to_string(),
                path: path.to_string(),
                body,
            })
            .await?;
            receiver
        };

        self.await_response(request_id, receiver).await
    }

    /// Performs the call against a connection held by this instance
    pub async fn request_local(
        &self,
        handle: crate::session::SessionHandle,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<LcuResponse, GatewayError> {
        let request_id = Ulid::new();
        let receiver = self.register(request_id, Some(handle.connection_id));
        handle.push(ServerFrame::LcuRequest {
            id: request_id,
            method: method.to_string(),
            path: path.to_string(),
            body,
        });
        self.await_response(request_id, receiver).await
    }

    async fn await_response(
        &self,
        request_id: Ulid,
        receiver: oneshot::Receiver<Result<LcuResponse, GatewayError>>,
    ) -> Result<LcuResponse, GatewayError> {
        match tokio::time::timeout(REQUEST_TIMEOUT, receiver).await {
            Ok(Ok(result)) => result,
            // Completion side dropped without answering
            Ok(Err(_)) => Err(GatewayError::Disconnected),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(GatewayError::Timeout)
            }
        }
    }

    fn register(
        &self,
        request_id: Ulid,
        connection_id: Option<Uuid>,
    ) -> oneshot::Receiver<Result<LcuResponse, GatewayError>> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(
            request_id,
            PendingRpc {
                sender,
                connection_id,
            },
        );
        receiver
    }

    /// Completes a pending request, false when the correlation id is
    /// unknown (already timed out or answered)
    pub fn complete(&self, request_id: Ulid, result: Result<LcuResponse, GatewayError>) -> bool {
        match self.pending.lock().remove(&request_id) {
            Some(pending) => pending.sender.send(result).is_ok(),
            None => false,
        }
    }

    /// Fails every request served by a dropped connection
    pub fn fail_connection(&self, connection_id: Uuid) {
        let failed: Vec<PendingRpc> = {
            let mut pending = self.pending.lock();
            let ids: Vec<Ulid> = pending
                .iter()
                .filter(|(_, rpc)| rpc.connection_id == Some(connection_id))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id))
                .collect()
        };

        for rpc in failed {
            _ = rpc.sender.send(Err(GatewayError::Disconnected));
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Gateway, GatewayError, LcuResponse};
    use ulid::Ulid;
    use uuid::Uuid;

    #[tokio::test]
    async fn completion_resolves_pending_request() {
        let gateway = Gateway::default();
        let id = Ulid::new();
        let receiver = gateway.register(id, None);

        assert!(gateway.complete(
            id,
            Ok(LcuResponse {
                status: 200,
                body: None
            })
        ));
        let result = receiver.await.unwrap().unwrap();
        assert_eq!(result.status, 200);

        // Double completion finds nothing
        assert!(!gateway.complete(
            id,
            Ok(LcuResponse {
                status: 200,
                body: None
            })
        ));
    }

    #[tokio::test]
    async fn disconnect_fails_only_that_connection() {
        let gateway = Gateway::default();
        let connection = Uuid::new_v4();
        let other = Uuid::new_v4();

        let id_a = Ulid::new();
        let id_b = Ulid::new();
        let rx_a = gateway.register(id_a, Some(connection));
        let rx_b = gateway.register(id_b, Some(other));

        gateway.fail_connection(connection);

        assert!(matches!(
            rx_a.await.unwrap(),
            Err(GatewayError::Disconnected)
        ));
        assert!(gateway.complete(
            id_b,
            Ok(LcuResponse {
                status: 200,
                body: None
            })
        ));
        assert!(rx_b.await.unwrap().is_ok());
    }
}
