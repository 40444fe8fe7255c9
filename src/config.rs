use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL; the in-memory store is used when unset
    #[arg(long, env = "MARKET_DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub live_view: LiveViewConfig,

    #[command(flatten)]
    pub sweeper: SweeperConfig,

    #[command(flatten)]
    pub push: PushConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "MARKET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MARKET_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health probes, on-demand sweeps)
    #[arg(long, env = "MARKET_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks during shutdown
    #[arg(long, env = "MARKET_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Maximum number of connections in the pool
    #[arg(long = "db-max-connections", env = "MARKET_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long = "db-min-connections", env = "MARKET_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a connection from the pool
    #[arg(long = "db-acquire-timeout-secs", env = "MARKET_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds before an idle connection is closed
    #[arg(long = "db-idle-timeout-secs", env = "MARKET_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a connection in seconds
    #[arg(long = "db-max-lifetime-secs", env = "MARKET_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Maximum length of a direct message in characters
    #[arg(long, env = "MARKET_MAX_TEXT_LENGTH", default_value_t = 1000)]
    pub max_text_length: usize,

    /// Maximum length of a story caption or text story in characters
    #[arg(long, env = "MARKET_MAX_CAPTION_LENGTH", default_value_t = 2000)]
    pub max_caption_length: usize,

    /// Page size used when a reader does not ask for one
    #[arg(long, env = "MARKET_DEFAULT_PAGE_SIZE", default_value_t = 50)]
    pub default_page_size: usize,

    /// Upper bound on any requested page size
    #[arg(long, env = "MARKET_MAX_PAGE_SIZE", default_value_t = 200)]
    pub max_page_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct LiveViewConfig {
    /// Longest interval between expiry re-evaluations of an open subscription
    #[arg(long = "live-refresh-interval-ms", env = "MARKET_LIVE_REFRESH_INTERVAL_MS", default_value_t = 30_000)]
    pub refresh_interval_ms: u64,

    /// Snapshots buffered per subscription before the producer waits
    #[arg(long, env = "MARKET_LIVE_BUFFER_SIZE", default_value_t = 16)]
    pub subscription_buffer_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct SweeperConfig {
    /// How often to run the expiry sweep (0 disables the scheduled sweep)
    #[arg(long, env = "MARKET_SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    pub sweep_interval_secs: u64,

    /// Records deleted per atomic batch, clamped to the store maximum
    #[arg(long, env = "MARKET_SWEEP_BATCH_SIZE", default_value_t = 500)]
    pub sweep_batch_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct PushConfig {
    /// Maximum concurrent sends per fan-out
    #[arg(long, env = "MARKET_PUSH_CONCURRENCY", default_value_t = 32)]
    pub push_concurrency: usize,

    /// Per-token send timeout in milliseconds
    #[arg(long, env = "MARKET_PUSH_SEND_TIMEOUT_MS", default_value_t = 5000)]
    pub push_send_timeout_ms: u64,

    /// Number of invalid tokens to collect before pruning
    #[arg(long, env = "MARKET_JANITOR_BATCH_SIZE", default_value_t = 100)]
    pub janitor_batch_size: usize,

    /// How often to prune collected invalid tokens regardless of batch size
    #[arg(long, env = "MARKET_JANITOR_INTERVAL_SECS", default_value_t = 30)]
    pub janitor_interval_secs: u64,

    /// Capacity of the invalid-token channel
    #[arg(long, env = "MARKET_JANITOR_CHANNEL_CAPACITY", default_value_t = 1024)]
    pub janitor_channel_capacity: usize,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the content store readiness check in milliseconds
    #[arg(long, env = "MARKET_HEALTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    /// Timeout for the recipient directory readiness check in milliseconds
    #[arg(long, env = "MARKET_HEALTH_DIRECTORY_TIMEOUT_MS", default_value_t = 2000)]
    pub directory_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "MARKET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; tracing and metrics export is disabled when unset
    #[arg(long, env = "MARKET_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Metrics export interval in seconds
    #[arg(long, env = "MARKET_METRICS_EXPORT_INTERVAL_SECS", default_value_t = 60)]
    pub metrics_export_interval_secs: u64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

impl MessagingConfig {
    /// Resolves a reader's requested page size against the configured bounds.
    #[must_use]
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_page_size).clamp(1, self.max_page_size.max(1))
    }
}
