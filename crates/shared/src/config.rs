//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::observability::ObservabilityConfig;

/// 规则引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 规则集快照文件（JSON）
    pub rules_path: PathBuf,
    /// 字段 schema 文件（JSON），由目录/配置器服务提供
    pub schema_path: PathBuf,
    /// 是否允许跨规则并行匹配条件
    pub parallel_matching: bool,
    /// 启用并行匹配所需的最少活跃规则数
    pub parallel_threshold: usize,
    /// 单次评估的默认超时（毫秒），0 表示不设超时
    pub default_timeout_ms: u64,
    /// 规则文件变更的 debounce 窗口（毫秒）
    pub watch_debounce_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("config/rules.json"),
            schema_path: PathBuf::from("config/schema.json"),
            parallel_matching: true,
            parallel_threshold: 64,
            default_timeout_ms: 0,
            watch_debounce_ms: 500,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineSettings,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "cpq-rule-engine".to_string(),
            environment: "development".to_string(),
            engine: EngineSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CPQ_ 前缀，双下划线分隔层级，如 CPQ_ENGINE__PARALLEL_THRESHOLD -> engine.parallel_threshold）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from_dir(service_name, config_dir)
    }

    /// 从指定目录加载配置
    pub fn load_from_dir(
        service_name: &str,
        config_dir: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let env = std::env::var("CPQ_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("CPQ")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.observability.service_name = config.service_name.clone();
        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
