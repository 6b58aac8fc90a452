use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use evently_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig},
};
use evently_core::clock::SystemClock;
use evently_core::memory::MemoryStore;
use evently_core::publisher::{EventPublisher, LogPublisher};
use evently_core::repository::DocumentStore;
use evently_core::{Limits, Services};
use evently_store::app_config::{Config, StorageBackend};
use evently_store::{DbClient, KafkaPublisher, PgDocumentStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evently_api=debug,evently_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Evently API on port {}", config.server.port);

    let store: Arc<dyn DocumentStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgDocumentStore::new(db.pool))
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.kafka.brokers {
        Some(brokers) => Arc::new(
            KafkaPublisher::new(brokers, &config.kafka.topic_prefix).context("Failed to create Kafka producer")?,
        ),
        None => {
            tracing::info!("No Kafka brokers configured; domain events are logged only");
            Arc::new(LogPublisher)
        }
    };

    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisClient::new(url).context("Invalid Redis url")?)),
        None => None,
    };

    let limits = Limits {
        max_message_length: config.limits.max_message_length,
        conflict_preview_limit: config.limits.conflict_preview_limit,
    };
    let services = Services::new(store, publisher, Arc::new(SystemClock), limits);

    let app_state = AppState {
        services: Arc::new(services),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            webhook_secret: config.auth.webhook_secret.clone(),
        },
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
        rate_limit_per_minute: config.limits.rate_limit_per_minute,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
