use crate::{
    middleware::summoner::SummonerName,
    services::registry::LcuBinding,
    state::AppState,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LcuError {
    /// The caller's session lives on another instance
    #[error("Session is connected to another instance")]
    WrongInstance,
}

/// Body of a credential binding request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    #[serde(default = "default_host")]
    host: String,
    port: u16,
    protocol: String,
    password: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// POST /api/lcu/configure
///
/// Binds the caller's local game client credentials to their known
/// session. The session must be connected to this instance.
pub async fn configure(
    SummonerName(summoner_name): SummonerName,
    Extension(app): Extension<AppState>,
    Json(request): Json<ConfigureRequest>,
) -> Result<StatusCode, LcuError> {
    if app.registry.lookup_local(&summoner_name).is_none() {
        return Err(LcuError::WrongInstance);
    }

    app.registry.set_lcu_binding(
        &summoner_name,
        LcuBinding {
            host: request.host,
            port: request.port,
            protocol: request.protocol,
            auth_token: request.password,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Response implementation for lcu route errors
impl IntoResponse for LcuError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Self::WrongInstance => StatusCode::MISDIRECTED_REQUEST,
        };

        (status_code, self.to_string()).into_response()
    }
}
