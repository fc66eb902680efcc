//! 配置管理
//!
//! 配置按 默认值 -> TOML 文件 -> `BATCH_` 环境变量 的顺序合并，后者覆盖前者。

pub mod models;

pub use models::{AppConfig, DatabaseConfig, EngineConfig};
