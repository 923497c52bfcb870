//! Duplex client sessions. Each desktop companion holds one
//! WebSocket on `/api/ws` carrying JSON frames, the first of which
//! must identify the summoner. The connection task owns the socket,
//! pushes from elsewhere in the server go through its handle.

use crate::{
    database::entities::{players, Player},
    services::{
        events::Event,
        gateway::{GatewayError, LcuResponse},
        queue::{self, QueueError},
        registry::LcuBinding,
        runner::{self, MatchInput, RouteError},
        votes::{self, VoteError},
    },
    state::AppState,
    utils::types::MatchId,
};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, warn};
use models::{ClientFrame, ErrorCode, ServerFrame};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod models;

/// Time the client has to send its identify frame
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between server pings, doubles as the registry heartbeat
const PING_INTERVAL: Duration = Duration::from_secs(60);

/// Pings that may go unanswered before the connection is dropped
const MAX_MISSED_PINGS: u8 = 2;

/// Cloneable push handle of a connected session
#[derive(Clone)]
pub struct SessionHandle {
    pub connection_id: Uuid,
    sender: mpsc::UnboundedSender<Outbound>,
}

enum Outbound {
    Frame(ServerFrame),
    /// A newer session claimed this summoner, close after informing
    CloseDuplicate,
}

impl SessionHandle {
    pub fn push(&self, frame: ServerFrame) {
        _ = self.sender.send(Outbound::Frame(frame));
    }

    pub fn close_duplicate(&self) {
        _ = self.sender.send(Outbound::CloseDuplicate);
    }
}

/// GET /api/ws
///
/// Upgrades the connection to the duplex session protocol. When an
/// api token is configured the upgrade request must carry it as a
/// bearer
pub async fn handle_upgrade(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    Extension(app): Extension<AppState>,
) -> Response {
    if let Some(expected) = &app.config.api.token {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    ws.on_upgrade(move |socket| run_session(app, socket))
}

async fn run_session(app: AppState, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();

    // The first frame must identify the summoner
    let identify = tokio::time::timeout(IDENTIFY_TIMEOUT, read_frame(&mut stream)).await;
    let identity = match identify {
        Ok(Some(ClientFrame::Identify {
            game_name,
            tag_line,
            puuid,
            region,
            profile_icon_id,
            ..
        })) => players::PlayerIdentity {
            game_name,
            tag_line,
            puuid,
            region,
            profile_icon_id,
        },
        _ => {
            send_frame(
                &mut sink,
                &ServerFrame::Error {
                    code: ErrorCode::IdentifyExpected,
                    message: "First frame must identify".to_string(),
                },
            )
            .await;
            _ = sink.close().await;
            return;
        }
    };

    let player = match Player::upsert_identity(&app.db, identity).await {
        Ok(value) => value,
        Err(err) => {
            warn!("Failed to persist identity: {err}");
            send_frame(
                &mut sink,
                &ServerFrame::Error {
                    code: ErrorCode::StoreUnavailable,
                    message: "Identity could not be stored".to_string(),
                },
            )
            .await;
            _ = sink.close().await;
            return;
        }
    };
    let summoner_name = player.summoner_name.clone();

    let (sender, mut outbound) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        connection_id,
        sender,
    };

    // Registration must not succeed silently while Redis is down
    match app.registry.register(&summoner_name, handle.clone()).await {
        Ok(Some(displaced)) => {
            let result = app
                .bus
                .publish(Event::SessionInvalidated {
                    summoner_name: summoner_name.clone(),
                    instance_id: displaced.instance_id,
                })
                .await;
            if let Err(err) = result {
                warn!("Failed to broadcast session invalidation: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!("Session registration failed for {summoner_name}: {err}");
            send_frame(
                &mut sink,
                &ServerFrame::Error {
                    code: ErrorCode::RegistryUnavailable,
                    message: "Session registry unavailable".to_string(),
                },
            )
            .await;
            _ = sink.close().await;
            return;
        }
    }

    debug!("Session identified: {summoner_name} ({connection_id})");
    send_frame(&mut sink, &ServerFrame::Identified { player }).await;

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.reset();
    let mut missed_pings: u8 = 0;

    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                match outgoing {
                    Some(Outbound::Frame(frame)) => {
                        if !send_frame(&mut sink, &frame).await {
                            break;
                        }
                    }
                    Some(Outbound::CloseDuplicate) => {
                        send_frame(&mut sink, &ServerFrame::Error {
                            code: ErrorCode::DuplicateSession,
                            message: "Session opened elsewhere".to_string(),
                        }).await;
                        break;
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(value) => value,
                            Err(err) => {
                                handle.push(ServerFrame::Error {
                                    code: ErrorCode::InvalidInput,
                                    message: format!("Malformed frame: {err}"),
                                });
                                continue;
                            }
                        };

                        if let ClientFrame::Pong { .. } = frame {
                            missed_pings = 0;
                            continue;
                        }

                        handle_frame(&app, &summoner_name, &handle, frame).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!("Socket error for {summoner_name}: {err}");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if missed_pings >= MAX_MISSED_PINGS {
                    debug!("Session {summoner_name} missed {missed_pings} pings, closing");
                    break;
                }
                missed_pings += 1;
                handle.push(ServerFrame::Ping {
                    ts: chrono::Utc::now().timestamp_millis(),
                });
                app.registry.heartbeat(&summoner_name).await;
            }
        }
    }

    debug!("Session closed: {summoner_name} ({connection_id})");

    // Connection loss fails every RPC served by this socket
    app.gateway.fail_connection(connection_id);
    app.registry.clear_lcu_binding(&summoner_name);
    app.registry.unregister(&summoner_name, connection_id).await;
    _ = sink.close().await;
}

/// Reads frames until a parseable client frame or the end of stream
async fn read_frame(
    stream: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<ClientFrame> {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn send_frame(
    sink: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(value) => value,
        Err(err) => {
            warn!("Failed to encode frame: {err}");
            return true;
        }
    };
    sink.send(Message::Text(text)).await.is_ok()
}

async fn handle_frame(
    app: &AppState,
    summoner_name: &str,
    handle: &SessionHandle,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Identify { .. } => {
            handle.push(ServerFrame::Error {
                code: ErrorCode::InvalidInput,
                message: "Already identified".to_string(),
            });
        }
        ClientFrame::RegisterLcuConnection {
            port,
            auth_token,
            protocol,
            ..
        } => {
            app.registry.set_lcu_binding(
                summoner_name,
                LcuBinding {
                    host: "127.0.0.1".to_string(),
                    port,
                    protocol,
                    auth_token,
                },
            );
        }
        ClientFrame::LcuResponse { id, status, body } => {
            app.gateway.complete(id, Ok(LcuResponse { status, body }));
        }
        ClientFrame::LcuError { id, error } => {
            app.gateway.complete(id, Err(GatewayError::Lcu(error)));
        }
        ClientFrame::JoinQueue {
            primary_lane,
            secondary_lane,
        } => {
            if let Err(err) = queue::join(app, summoner_name, primary_lane, secondary_lane).await {
                handle.push(queue_error_frame(err));
            }
        }
        ClientFrame::LeaveQueue => {
            if let Err(err) = queue::leave(app, summoner_name).await {
                handle.push(queue_error_frame(err));
            }
        }
        ClientFrame::AcceptMatch { match_id } => {
            route(app, handle, match_id, MatchInput::Accept {
                summoner_name: summoner_name.to_string(),
            })
            .await;
        }
        ClientFrame::DeclineMatch { match_id } => {
            route(app, handle, match_id, MatchInput::Decline {
                summoner_name: summoner_name.to_string(),
            })
            .await;
        }
        ClientFrame::DraftAction {
            match_id,
            index,
            champion_id,
        } => {
            route(app, handle, match_id, MatchInput::DraftAction {
                summoner_name: summoner_name.to_string(),
                index,
                champion_id,
            })
            .await;
        }
        ClientFrame::DraftEdit {
            match_id,
            index,
            champion_id,
        } => {
            route(app, handle, match_id, MatchInput::DraftEdit {
                summoner_name: summoner_name.to_string(),
                index,
                champion_id,
            })
            .await;
        }
        ClientFrame::DraftConfirm { match_id } => {
            route(app, handle, match_id, MatchInput::DraftConfirm {
                summoner_name: summoner_name.to_string(),
            })
            .await;
        }
        ClientFrame::VoteForMatch {
            match_id,
            lcu_game_id,
        } => {
            if let Err(err) = votes::cast_vote(app, summoner_name, match_id, lcu_game_id).await {
                handle.push(vote_error_frame(err));
            }
        }
        ClientFrame::MuteSpectator { match_id, target } => {
            let result = app
                .bus
                .publish(Event::SpectatorMuted {
                    match_id,
                    summoner_name: summoner_name.to_string(),
                    target,
                })
                .await;
            if result.is_err() {
                handle.push(ServerFrame::Error {
                    code: ErrorCode::BroadcastFailed,
                    message: "Mute could not be broadcast".to_string(),
                });
            }
        }
        ClientFrame::Pong { .. } => {}
    }
}

/// Delivers a match input to its runner, claiming the lease when the
/// match is currently driverless
async fn route(app: &AppState, handle: &SessionHandle, match_id: MatchId, input: MatchInput) {
    match runner::route_input(app, match_id, input).await {
        Ok(()) => {}
        Err(RouteError::WrongInstance) => handle.push(ServerFrame::Error {
            code: ErrorCode::WrongInstance,
            message: "Match is driven by another instance".to_string(),
        }),
        Err(RouteError::NotFound) => handle.push(ServerFrame::Error {
            code: ErrorCode::MatchNotFound,
            message: "No such active match".to_string(),
        }),
        Err(RouteError::Store(err)) => {
            warn!("Failed to route frame for match {match_id}: {err}");
            handle.push(ServerFrame::Error {
                code: ErrorCode::StoreUnavailable,
                message: "Storage unavailable".to_string(),
            });
        }
    }
}

fn queue_error_frame(err: QueueError) -> ServerFrame {
    let code = match &err {
        QueueError::AlreadyQueued => ErrorCode::AlreadyQueued,
        QueueError::AlreadyInMatch => ErrorCode::AlreadyInMatch,
        QueueError::InvalidLane => ErrorCode::InvalidLane,
        QueueError::UnknownPlayer => ErrorCode::InvalidInput,
        QueueError::Store(_) => ErrorCode::StoreUnavailable,
        QueueError::Broadcast(_) => ErrorCode::BroadcastFailed,
    };
    ServerFrame::Error {
        code,
        message: err.to_string(),
    }
}

fn vote_error_frame(err: VoteError) -> ServerFrame {
    let code = match &err {
        VoteError::MatchNotFound => ErrorCode::MatchNotFound,
        VoteError::NotVoting => ErrorCode::InvalidInput,
        VoteError::NotParticipant => ErrorCode::NotParticipant,
        VoteError::UnknownPlayer => ErrorCode::InvalidInput,
        VoteError::Store(_) => ErrorCode::StoreUnavailable,
        VoteError::Broadcast(_) => ErrorCode::BroadcastFailed,
    };
    ServerFrame::Error {
        code,
        message: err.to_string(),
    }
}
