pub mod app_config;
pub mod database;
pub mod engine;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use engine::EngineConfig;
