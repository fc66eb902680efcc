use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{database::DatabaseConfig, engine::EngineConfig};
use crate::logging::LogConfig;

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: BATCH_, nested keys joined by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url.clone())?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default("database.min_connections", defaults.database.min_connections)?
            .set_default(
                "database.connection_timeout_seconds",
                defaults.database.connection_timeout_seconds,
            )?
            .set_default(
                "database.idle_timeout_seconds",
                defaults.database.idle_timeout_seconds,
            )?
            .set_default("engine.default_max_retries", defaults.engine.default_max_retries)?
            .set_default(
                "engine.default_retry_delay_ms",
                defaults.engine.default_retry_delay_ms,
            )?
            .set_default(
                "engine.default_chunk_size",
                defaults.engine.default_chunk_size as u64,
            )?
            .set_default(
                "engine.retry_backoff_multiplier",
                defaults.engine.retry_backoff_multiplier,
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/batch.toml", "batch.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("BATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.engine.validate().context("引擎配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, OutputFormat};
    use std::io::Write;

    #[test]
    fn test_from_toml_partial_sections_fall_back_to_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "sqlite://jobs.db"
            max_connections = 8
            min_connections = 2
            connection_timeout_seconds = 10
            idle_timeout_seconds = 60

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url, "sqlite://jobs.db");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.engine.default_chunk_size, 100);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_toml_config_is_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [engine]
            default_max_retries = 3
            default_retry_delay_ms = 100
            default_chunk_size = 0
            retry_backoff_multiplier = 1.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [engine]
            default_max_retries = 2
            default_retry_delay_ms = 250
            default_chunk_size = 10
            retry_backoff_multiplier = 2.0
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.engine.default_max_retries, 2);
        assert_eq!(config.engine.default_chunk_size, 10);
        assert_eq!(config.engine.retry_backoff_multiplier, 2.0);
        assert_eq!(config.database.url, "sqlite://batch.db");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/batch.toml")).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let restored = AppConfig::from_toml(&text).unwrap();
        assert_eq!(restored.database.url, config.database.url);
        assert_eq!(restored.engine.default_chunk_size, config.engine.default_chunk_size);
    }
}
