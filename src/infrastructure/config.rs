use serde::Deserialize;

/// Application configuration for the quota engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub usage_provider: Option<UsageProviderConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub quota: QuotaConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&content)?;
        Ok(cfg)
    }

    /// 利用額の取得元は必須。static も明示した場合のみ使う。
    pub fn require_usage_provider(&self) -> anyhow::Result<&UsageProviderConfig> {
        self.usage_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!("usage_provider section is required (kind: http, redis or static)")
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8098
}

/// DatabaseConfig はデータベース接続の設定を表す（URL形式）。
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

/// RedisConfig は集計済み利用額を読む Redis の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "usage:cost:".to_string()
}

/// UsageProviderConfig は利用額の取得元を表す。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageProviderConfig {
    Http {
        base_url: String,
        #[serde(default = "default_usage_timeout_ms")]
        timeout_ms: u64,
    },
    Redis,
    Static,
}

fn default_usage_timeout_ms() -> u64 {
    2000
}

/// KafkaConfig は Kafka ブローカー接続の設定を表す。`kafka` feature 有効時のみ使用する。
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}

fn default_topic() -> String {
    "k1s0.system.quota.events.v1".to_string()
}

/// QuotaConfig はクォータエンジン固有の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_warning_dedup_window_minutes")]
    pub warning_dedup_window_minutes: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            warning_dedup_window_minutes: default_warning_dedup_window_minutes(),
        }
    }
}

fn default_warning_dedup_window_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_capacity: default_cache_max_capacity(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_capacity() -> u64 {
    100_000
}
