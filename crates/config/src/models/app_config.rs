use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{AutoAdvanceConfig, DatabaseConfig, LoggingConfig};
use crate::validation::{ConfigResult, ConfigValidator};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub auto_advance: AutoAdvanceConfig,
}

impl AppConfig {
    /// 加载配置：默认值 <- 可选TOML文件 <- SHIFTPLAN_* 环境变量
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(Environment::with_prefix("SHIFTPLAN").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.logging.validate()?;
        self.auto_advance.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // load() 读取进程级环境变量，并行跑的用例之间要互斥
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.url, "sqlite:shiftplan.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.auto_advance.enabled);
        assert_eq!(config.auto_advance.tick_interval_seconds, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let _env = env_guard();
        let config = AppConfig::load(Some("does-not-exist.toml")).unwrap();
        assert_eq!(config.database.url, "sqlite:shiftplan.db");
    }

    #[test]
    fn test_load_from_toml_file() {
        let _env = env_guard();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("shiftplan.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "[database]\nurl = \"sqlite::memory:\"\nmax_connections = 3\n\n[auto_advance]\ntick_interval_seconds = 60\n"
        )
        .unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.auto_advance.tick_interval_seconds, 60);
        // 未覆盖的段保持默认
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override() {
        let _env = env_guard();
        std::env::set_var("SHIFTPLAN_LOGGING__LEVEL", "debug");
        let config = AppConfig::load(None);
        std::env::remove_var("SHIFTPLAN_LOGGING__LEVEL");
        assert_eq!(config.unwrap().logging.level, "debug");
    }

    #[test]
    fn test_invalid_file_rejected_by_validation() {
        let _env = env_guard();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[database]\nurl = \"mysql://nope\"\n").unwrap();
        assert!(AppConfig::load(Some(path.to_str().unwrap())).is_err());
    }
}
