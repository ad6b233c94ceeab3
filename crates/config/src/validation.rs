use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置校验失败: {0}")]
    Validation(String),
    #[error("配置解析失败: {0}")]
    Parse(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// 各配置段自校验
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{field} must not be empty")));
        }
        Ok(())
    }

    pub fn validate_count(value: usize, field: &str) -> ConfigResult<()> {
        if value == 0 {
            return Err(ConfigError::Validation(format!(
                "{field} must be greater than zero"
            )));
        }
        Ok(())
    }

    pub fn validate_timeout_seconds(value: u64, field: &str) -> ConfigResult<()> {
        if value == 0 || value > 3600 {
            return Err(ConfigError::Validation(format!(
                "{field} must be within 1..=3600 seconds"
            )));
        }
        Ok(())
    }
}
