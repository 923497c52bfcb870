use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The HTTP header naming the calling summoner
const SUMMONER_HEADER: &str = "X-Summoner-Name";

/// Extractor for the canonical summoner name of the caller. Every
/// request bearing endpoint requires the header
pub struct SummonerName(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SummonerName
where
    S: Send + Sync,
{
    type Rejection = IdentityError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SUMMONER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .ok_or(IdentityError::MissingIdentity)
            .map(SummonerName)
    }
}

/// Error type used when the summoner header is absent
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity header was not provided on the request
    #[error("Missing summoner identity")]
    MissingIdentity,
}

/// IntoResponse implementation for IdentityError to allow it to be
/// used within the result type as an error response
impl IntoResponse for IdentityError {
    #[inline]
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Body::from(self.to_string())).into_response()
    }
}
