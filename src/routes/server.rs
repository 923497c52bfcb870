use crate::{config::VERSION, state::AppState};
use axum::{Extension, Json};
use serde::Serialize;

/// Response detailing the server identity
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetails {
    /// Identifier of the server type
    ident: &'static str,
    /// The server version
    version: &'static str,
    /// Identity of this instance within the fleet
    instance_id: String,
}

/// GET /api/server
///
/// Basic identity route used by clients to validate the server and
/// learn which instance they reached.
pub async fn server_details(Extension(app): Extension<AppState>) -> Json<ServerDetails> {
    Json(ServerDetails {
        ident: "RIFT_RELAY_SERVER",
        version: VERSION,
        instance_id: app.instance_id.clone(),
    })
}
