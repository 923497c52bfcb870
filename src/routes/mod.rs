use crate::session;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

mod lcu;
mod matches;
mod queue;
mod server;

/// Function for configuring the provided service config with all the
/// application routes.
pub fn router() -> Router {
    Router::new().nest(
        "/api",
        Router::new()
            // Duplex client sessions
            .route("/ws", get(session::handle_upgrade))
            // Queue surface
            .nest(
                "/queue",
                Router::new()
                    .route("/", get(queue::get_status))
                    .route("/my-active-match", get(queue::get_my_active_match)),
            )
            // Match facade
            .nest(
                "/match",
                Router::new()
                    .route("/:id/cancel", delete(matches::cancel_match))
                    .route("/:id/vote", post(matches::post_vote))
                    .route("/:id/votes", get(matches::get_votes)),
            )
            // Gateway credential binding
            .route("/lcu/configure", post(lcu::configure))
            // Server details
            .route("/server", get(server::server_details))
            // The companion UI is served from another origin
            .layer(CorsLayer::permissive()),
    )
}
