use serde::{Deserialize, Serialize};

use crate::validation::{ConfigResult, ConfigValidator, ValidationUtils};

/// 自动接班策略的触发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoAdvanceConfig {
    pub enabled: bool,
    pub tick_interval_seconds: u64,
}

impl Default for AutoAdvanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: 300,
        }
    }
}

impl ConfigValidator for AutoAdvanceConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.tick_interval_seconds,
            "auto_advance.tick_interval_seconds",
        )
    }
}
