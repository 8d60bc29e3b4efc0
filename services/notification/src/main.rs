use std::sync::Arc;

use async_nats::jetstream;
use sea_orm::Database;
use tracing::{error, info};

use userhub_core::config::Config;
use userhub_core::shutdown::{spawn_signal_listener, wait_for_shutdown};
use userhub_core::tracing::init_tracing;

use userhub_notification::config::NotificationConfig;
use userhub_notification::consumer::IdempotentConsumer;
use userhub_notification::infra::broker::{
    NatsDeadLetterSink, ensure_streams, spawn_partition_workers,
};
use userhub_notification::infra::db::DbConsumedEventStore;
use userhub_notification::infra::mailer::SmtpMailer;
use userhub_notification::router::build_router;
use userhub_notification::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = NotificationConfig::from_env();
    let topic = config.topic();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let nats = async_nats::connect(&config.nats_url)
        .await
        .expect("failed to connect to NATS");
    let jetstream = jetstream::new(nats);
    ensure_streams(&jetstream, &topic)
        .await
        .expect("failed to ensure streams");

    let mailer = SmtpMailer::new(&config.smtp_settings()).expect("invalid SMTP settings");

    let consumer = Arc::new(IdempotentConsumer::new(
        DbConsumedEventStore { db: db.clone() },
        mailer.clone(),
        NatsDeadLetterSink::new(jetstream.clone()),
        config.consumer_settings(),
    ));

    let shutdown = spawn_signal_listener();

    // Partition workers
    let workers = spawn_partition_workers(
        &jetstream,
        &topic,
        &config.worker_settings(),
        consumer,
        shutdown.clone(),
    )
    .await
    .expect("failed to start partition workers");

    // HTTP server
    let router = build_router(AppState { db, mailer });
    let http_addr = format!("0.0.0.0:{}", config.notification_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind");

    info!("notification service listening on {http_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .expect("server error");

    for worker in workers {
        if let Err(e) = worker.await {
            error!(error = %e, "partition worker panicked");
        }
    }
    info!("notification service stopped");
}
