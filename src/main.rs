#![warn(unused_crate_dependencies)]

use crate::{
    config::{load_config, PrivilegedVoter, VERSION},
    database::entities::{event_inbox, settings, Match},
    services::{
        dispatcher,
        events::EventBus,
        gateway::Gateway,
        ownership::Ownership,
        queue,
        registry::SessionRegistry,
        runner::{self, ActiveMatches},
        votes::VoteWeights,
    },
    state::App,
    utils::logging,
};
use axum::Extension;
use log::{error, info, warn};
use redis::aio::ConnectionManager;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use uuid::Uuid;

mod config;
mod database;
mod middleware;
mod routes;
mod services;
mod session;
mod state;
mod utils;

/// Delay between queue builder wakes
const QUEUE_TICK: Duration = Duration::from_secs(1);

/// Delay between sweeps for driverless non-terminal matches
const ORPHAN_SWEEP: Duration = Duration::from_secs(15);

/// Event inbox retention and prune cadence
const INBOX_RETENTION: chrono::Duration = chrono::Duration::hours(1);
const INBOX_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() {
    // Load configuration
    let config = load_config().unwrap_or_default();

    // Initialize logging
    logging::setup(config.logging);

    // Create the server socket address while the port is still available
    let addr: SocketAddr = SocketAddr::new(config.host, config.port);

    let instance_id = Uuid::new_v4().to_string();
    info!("Starting instance {instance_id} (v{VERSION})");

    let db = match database::init(&config).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to initialize database: {err}");
            return;
        }
    };

    // Redis carries the session registry, leases and the event bus
    let redis_client = match redis::Client::open(config.redis.url.as_str()) {
        Ok(value) => value,
        Err(err) => {
            error!("Invalid redis url: {err}");
            return;
        }
    };
    let redis_manager = match ConnectionManager::new(redis_client.clone()).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to connect to redis: {err}");
            return;
        }
    };

    let bus = EventBus::new(redis_manager.clone());
    tokio::spawn(services::events::listen(
        redis_client,
        bus.local_sender(),
    ));

    let vote_weights = VoteWeights::new(&config, load_persisted_voters(&db).await);

    let app: Arc<App> = Arc::new(App {
        registry: SessionRegistry::new(instance_id.clone(), redis_manager.clone()),
        gateway: Gateway::default(),
        ownership: Ownership::new(
            instance_id.clone(),
            db.clone(),
            redis_manager,
            &config.ownership,
        ),
        active_matches: ActiveMatches::default(),
        vote_weights,
        instance_id,
        config,
        db,
        bus,
    });

    // Event consumer translating bus events into local pushes and
    // ownership claims
    tokio::spawn(dispatcher::run(app.clone()));
    tokio::spawn(queue_tick(app.clone()));
    tokio::spawn(orphan_sweep(app.clone()));
    tokio::spawn(inbox_janitor(app.clone()));

    logging::log_connection_urls(addr.port(), app.config.public_address);

    // Create the HTTP router
    let router = routes::router()
        .layer(Extension(app))
        .into_make_service_with_connect_info::<SocketAddr>();

    info!("Starting server on {} (v{})", addr, VERSION);

    // Start the TCP listener
    let listener = match TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to bind HTTP server on {}: {:?}", addr, err);
            return;
        }
    };

    // Run the HTTP server
    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            _ = signal::ctrl_c().await;
        })
        .await
    {
        error!("Error within HTTP server {:?}", err);
    }
}

/// Reads the persisted privileged voter list merged over the config
async fn load_persisted_voters(
    db: &sea_orm::DatabaseConnection,
) -> Option<Vec<PrivilegedVoter>> {
    let raw = match settings::Model::get(db, settings::PRIVILEGED_VOTERS).await {
        Ok(value) => value?,
        Err(err) => {
            warn!("Failed to read privileged voter settings: {err}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Malformed privileged voter settings: {err}");
            None
        }
    }
}

/// Periodic builder wake, catches matches enabled by timeouts or
/// activity on other instances
async fn queue_tick(app: state::AppState) {
    let mut interval = tokio::time::interval(QUEUE_TICK);
    loop {
        interval.tick().await;
        if let Err(err) = queue::process(&app).await {
            warn!("Queue tick failed: {err}");
        }
    }
}

/// Claims non-terminal matches with no live driver, picking up work
/// left behind by crashed instances
async fn orphan_sweep(app: state::AppState) {
    let mut interval = tokio::time::interval(ORPHAN_SWEEP);
    loop {
        interval.tick().await;

        let matches = match Match::all_non_terminal(&app.db).await {
            Ok(value) => value,
            Err(err) => {
                warn!("Orphan sweep query failed: {err}");
                continue;
            }
        };

        for model in matches {
            if app.active_matches.contains(model.id) {
                continue;
            }
            match app.ownership.claim(model.id).await {
                Ok(true) => {
                    info!("Claimed match {} on sweep", model.id);
                    runner::spawn(app.clone(), model.id);
                }
                Ok(false) => {}
                Err(err) => warn!("Ownership claim failed for match {}: {err}", model.id),
            }
        }
    }
}

/// Prunes processed event ids past the retention horizon
async fn inbox_janitor(app: state::AppState) {
    let mut interval = tokio::time::interval(INBOX_PRUNE_INTERVAL);
    loop {
        interval.tick().await;
        let cutoff = chrono::Utc::now() - INBOX_RETENTION;
        if let Err(err) = event_inbox::Model::prune_before(&app.db, cutoff).await {
            warn!("Inbox prune failed: {err}");
        }
    }
}
