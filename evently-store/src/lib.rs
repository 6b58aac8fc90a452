pub mod app_config;
pub mod database;
pub mod pg_store;
pub mod redis_repo;
pub mod events;

pub use app_config::Config;
pub use database::DbClient;
pub use events::KafkaPublisher;
pub use pg_store::PgDocumentStore;
pub use redis_repo::RedisClient;
