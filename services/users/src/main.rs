use sea_orm::Database;
use tracing::{error, info};

use userhub_core::config::Config;
use userhub_core::shutdown::{spawn_signal_listener, wait_for_shutdown};
use userhub_core::tracing::init_tracing;

use userhub_users::config::UsersConfig;
use userhub_users::infra::broker::{self, NatsEventPublisher};
use userhub_users::relay::RelayPublisher;
use userhub_users::router::build_router;
use userhub_users::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = UsersConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Broker outages only stall the relay; the API starts regardless.
    let nats = broker::connect(&config.nats_url)
        .await
        .expect("invalid NATS configuration");
    let publisher = NatsEventPublisher::new(nats, config.topic());

    let state = AppState { db };
    let shutdown = spawn_signal_listener();

    // Outbox relay
    let relay = RelayPublisher::new(state.outbox_repo(), publisher, config.relay_settings());
    let relay_shutdown = shutdown.clone();
    let relay_task = tokio::spawn(async move { relay.run(relay_shutdown).await });

    // HTTP server
    let router = build_router(state);
    let http_addr = format!("0.0.0.0:{}", config.users_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind");

    info!("users service listening on {http_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .expect("server error");

    if let Err(e) = relay_task.await {
        error!(error = %e, "outbox relay task panicked");
    }
    info!("users service stopped");
}
