use crate::{
    database::entities::Match,
    middleware::summoner::SummonerName,
    services::queue::{self, QueueError, QueueStatus},
    state::AppState,
};
use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use thiserror::Error;

/// Errors that could occur while working with queue endpoints
#[derive(Debug, Error)]
pub enum QueueRouteError {
    /// The caller has no active match
    #[error("No active match")]
    NoActiveMatch,
    #[error("Internal server error")]
    Server,
}

/// GET /api/queue
///
/// Current queue composition and a rough wait estimate.
pub async fn get_status(
    SummonerName(_summoner_name): SummonerName,
    Extension(app): Extension<AppState>,
) -> Result<Json<QueueStatus>, QueueRouteError> {
    let status = queue::status(&app).await?;
    Ok(Json(status))
}

/// The query structure for the active match lookup. The name falls
/// back onto the identity header when absent
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMatchQuery {
    summoner_name: Option<String>,
}

/// GET /api/queue/my-active-match
///
/// The caller's non-terminal match, 404 when none exists.
pub async fn get_my_active_match(
    SummonerName(summoner_name): SummonerName,
    Query(query): Query<ActiveMatchQuery>,
    Extension(app): Extension<AppState>,
) -> Result<Json<Match>, QueueRouteError> {
    let name = query
        .summoner_name
        .map(|value| value.to_lowercase())
        .unwrap_or(summoner_name);

    let model = Match::active_for_summoner(&app.db, &name)
        .await
        .map_err(|_| QueueRouteError::Server)?
        .ok_or(QueueRouteError::NoActiveMatch)?;

    Ok(Json(model))
}

impl From<QueueError> for QueueRouteError {
    fn from(_: QueueError) -> Self {
        Self::Server
    }
}

/// Response implementation for queue route errors
impl IntoResponse for QueueRouteError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Self::NoActiveMatch => StatusCode::NOT_FOUND,
            Self::Server => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}
