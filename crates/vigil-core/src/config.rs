use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default scan cadence in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Default lead window: UpcomingReminder fires up to 15 minutes ahead.
pub const DEFAULT_LEAD_WINDOW_SECS: u64 = 900;
/// Default grace: the candidate fetch window still covers appointments up to
/// an hour overdue.
pub const DEFAULT_GRACE_SECS: u64 = 3600;
/// Default bound on concurrent per-appointment dispatch tasks within one scan.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default age after which an unconfirmed claim is treated as dangling.
pub const DEFAULT_CLAIM_TTL_SECS: u64 = 600;
/// Default webhook request timeout.
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;

/// Top-level config (vigil.toml + VIGIL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VigilConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Scan-and-dispatch engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tick frequency of the scheduler loop.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How far ahead of `scheduled_at` an UpcomingReminder fires.
    #[serde(default = "default_lead_window_secs")]
    pub lead_window_secs: u64,
    /// How far back the candidate fetch window reaches past `scheduled_at`.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    /// Max concurrent per-appointment dispatch tasks within one scan.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Unconfirmed claims older than this are released at scan start so a
    /// crash between claim and send never blocks retry permanently.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
    /// When true, a permanent sender rejection writes a terminal
    /// `suppressed` dispatch marker instead of being retried every tick.
    #[serde(default)]
    pub suppress_permanent: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            lead_window_secs: DEFAULT_LEAD_WINDOW_SECS,
            grace_secs: DEFAULT_GRACE_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            claim_ttl_secs: DEFAULT_CLAIM_TTL_SECS,
            suppress_permanent: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Delivery adapter selection. With no `webhook_url` the daemon falls back
/// to the tracing-log sender (useful for local runs and tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint that receives notification payloads as JSON POSTs.
    pub webhook_url: Option<String>,
    /// Optional bearer token sent in the Authorization header.
    pub webhook_token: Option<String>,
    /// Per-request timeout for the webhook sender.
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_token: None,
            timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
        }
    }
}

impl VigilConfig {
    /// Load config: explicit path > VIGIL_CONFIG env > ~/.vigil/vigil.toml.
    ///
    /// Env overrides use the `VIGIL_` prefix split on `_`, e.g.
    /// `VIGIL_MONITOR_INTERVAL_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: VigilConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("VIGIL_").split("_"))
            .extract()
            .map_err(|e| crate::error::VigilError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.vigil/vigil.toml", home)
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.vigil/vigil.db", home)
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_lead_window_secs() -> u64 {
    DEFAULT_LEAD_WINDOW_SECS
}

fn default_grace_secs() -> u64 {
    DEFAULT_GRACE_SECS
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_claim_ttl_secs() -> u64 {
    DEFAULT_CLAIM_TTL_SECS
}

fn default_notify_timeout_ms() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_MS
}
