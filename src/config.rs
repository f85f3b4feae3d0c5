use bigdecimal::BigDecimal;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub estimation: EstimationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// 慢查询告警阈值 (秒)
    pub slow_statement_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// 内存存储 + 示例数据
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// 估算默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationConfig {
    pub default_vat_rate: BigDecimal,
    pub default_waste_factor: BigDecimal,
    pub alternatives_per_item: usize,
    pub max_substitutions: usize,
    pub history_days: i64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            default_vat_rate: BigDecimal::new(20.into(), 2),
            default_waste_factor: BigDecimal::new(10.into(), 2),
            alternatives_per_item: crate::service::substitution::DEFAULT_ALTERNATIVES_PER_ITEM,
            max_substitutions: 5,
            history_days: 30,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/estimate_engine".to_string(),
                max_connections: 20,
                slow_statement_secs: 5,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
            },
            estimation: EstimationConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置：默认值 < config/estimate-engine.* < ESTIMATE__* 环境变量 < DATABASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", defaults.database.max_connections as i64)?
            .set_default("database.slow_statement_secs", defaults.database.slow_statement_secs as i64)?
            .set_default("storage.backend", "postgres")?
            .set_default("estimation.default_vat_rate", defaults.estimation.default_vat_rate.to_string())?
            .set_default(
                "estimation.default_waste_factor",
                defaults.estimation.default_waste_factor.to_string(),
            )?
            .set_default("estimation.alternatives_per_item", defaults.estimation.alternatives_per_item as i64)?
            .set_default("estimation.max_substitutions", defaults.estimation.max_substitutions as i64)?
            .set_default("estimation.history_days", defaults.estimation.history_days)?
            .add_source(File::with_name("config/estimate-engine").required(false))
            .add_source(Environment::with_prefix("ESTIMATE").separator("__").try_parsing(true))
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }
}
