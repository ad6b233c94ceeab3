use serde::{Deserialize, Serialize};

use crate::validation::{ConfigError, ConfigResult, ConfigValidator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ConfigValidator for LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {LEVELS:?}"
            )));
        }
        if self.format != "pretty" && self.format != "json" {
            return Err(ConfigError::Validation(
                "logging.format must be 'pretty' or 'json'".to_string(),
            ));
        }
        Ok(())
    }
}
