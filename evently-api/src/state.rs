use std::sync::Arc;

use evently_core::Services;
use evently_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub webhook_secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    /// Rate limiting is skipped when absent.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
    pub rate_limit_per_minute: i64,
}
