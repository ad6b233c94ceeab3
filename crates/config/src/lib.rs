pub mod models;
pub mod validation;

pub use models::{AppConfig, AutoAdvanceConfig, DatabaseConfig, LoggingConfig};
pub use validation::{ConfigError, ConfigResult, ConfigValidator, ValidationUtils};
