pub mod app_config;
pub mod auto_advance;
pub mod database;
pub mod logging;

pub use app_config::AppConfig;
pub use auto_advance::AutoAdvanceConfig;
pub use database::DatabaseConfig;
pub use logging::LoggingConfig;
