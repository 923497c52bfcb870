use crate::{
    database::entities::Match,
    middleware::summoner::SummonerName,
    services::{
        runner::{self, MatchInput, RouteError},
        votes::{self, VoteError},
    },
    state::AppState,
    utils::types::{LcuGameId, MatchId},
};
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that could occur while working with match endpoints
#[derive(Debug, Error)]
pub enum MatchesError {
    #[error("Match not found")]
    NotFound,
    /// The caller is not a member of the match
    #[error("Not a participant")]
    NotParticipant,
    #[error("Match is not accepting votes")]
    NotVoting,
    /// The match is driven elsewhere and could not be claimed
    #[error("Match is driven by another instance")]
    WrongInstance,
    #[error("Internal server error")]
    Server,
}

/// DELETE /api/match/:id/cancel
///
/// Participant initiated cancellation, routed to the instance
/// driving the match.
pub async fn cancel_match(
    SummonerName(summoner_name): SummonerName,
    Path(match_id): Path<MatchId>,
    Extension(app): Extension<AppState>,
) -> Result<StatusCode, MatchesError> {
    let model = Match::by_id(&app.db, match_id)
        .await
        .map_err(|_| MatchesError::Server)?
        .ok_or(MatchesError::NotFound)?;

    if model.team_of(&summoner_name).is_none() {
        return Err(MatchesError::NotParticipant);
    }

    runner::route_input(
        &app,
        match_id,
        MatchInput::CancelRequested {
            summoner_name,
        },
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Body of a link vote
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    lcu_game_id: LcuGameId,
}

/// Weighted tallies of a match's link votes
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotesResponse {
    votes: BTreeMap<LcuGameId, u32>,
}

/// POST /api/match/:id/vote
///
/// Records or overwrites the caller's link vote and returns the
/// updated weighted tallies.
pub async fn post_vote(
    SummonerName(summoner_name): SummonerName,
    Path(match_id): Path<MatchId>,
    Extension(app): Extension<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VotesResponse>, MatchesError> {
    let votes = votes::cast_vote(&app, &summoner_name, match_id, request.lcu_game_id).await?;
    Ok(Json(VotesResponse { votes }))
}

/// GET /api/match/:id/votes
///
/// The weighted vote count per candidate game.
pub async fn get_votes(
    SummonerName(_summoner_name): SummonerName,
    Path(match_id): Path<MatchId>,
    Extension(app): Extension<AppState>,
) -> Result<Json<VotesResponse>, MatchesError> {
    let votes = votes::weighted_votes(&app, match_id).await?;
    Ok(Json(VotesResponse { votes }))
}

impl From<VoteError> for MatchesError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::MatchNotFound => Self::NotFound,
            VoteError::NotVoting => Self::NotVoting,
            VoteError::NotParticipant | VoteError::UnknownPlayer => Self::NotParticipant,
            VoteError::Store(_) | VoteError::Broadcast(_) => Self::Server,
        }
    }
}

impl From<RouteError> for MatchesError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::WrongInstance => Self::WrongInstance,
            RouteError::NotFound => Self::NotFound,
            RouteError::Store(_) => Self::Server,
        }
    }
}

/// Response implementation for match route errors
impl IntoResponse for MatchesError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::NotParticipant => StatusCode::FORBIDDEN,
            Self::NotVoting => StatusCode::CONFLICT,
            Self::WrongInstance => StatusCode::MISDIRECTED_REQUEST,
            Self::Server => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}
