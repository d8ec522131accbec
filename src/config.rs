use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Scheme + host the console is served from; proxy links are `{public_origin}/{slug}`.
    pub public_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    #[serde(default = "default_readme_path")]
    pub default_readme_path: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            default_readme_path: default_readme_path(),
        }
    }
}

fn default_cli_path() -> String {
    "docker".into()
}

fn default_readme_path() -> String {
    crate::labels::DEFAULT_README_PATH.into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// How long a new session waits for the push stream before polling.
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Polls in flight across all sessions; 0 = no cap.
    #[serde(default)]
    pub max_concurrent_polls: usize,
    #[serde(default = "default_ws_send_timeout_secs")]
    pub ws_send_timeout_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            watchdog_ms: default_watchdog_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent_polls: 0,
            ws_send_timeout_secs: default_ws_send_timeout_secs(),
        }
    }
}

fn default_watchdog_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_ws_send_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.server.public_origin = config.server.public_origin.trim_end_matches('/').into();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        let origin = url::Url::parse(&self.server.public_origin).map_err(|e| {
            anyhow::anyhow!(
                "server.public_origin must be an absolute URL, got {:?}: {}",
                self.server.public_origin,
                e
            )
        })?;
        anyhow::ensure!(
            matches!(origin.scheme(), "http" | "https"),
            "server.public_origin must use http or https, got {}",
            origin.scheme()
        );
        anyhow::ensure!(
            !self.docker.cli_path.is_empty(),
            "docker.cli_path must be non-empty"
        );
        anyhow::ensure!(
            self.stats.watchdog_ms > 0,
            "stats.watchdog_ms must be > 0, got {}",
            self.stats.watchdog_ms
        );
        anyhow::ensure!(
            self.stats.poll_interval_ms > 0,
            "stats.poll_interval_ms must be > 0, got {}",
            self.stats.poll_interval_ms
        );
        anyhow::ensure!(
            self.stats.ws_send_timeout_secs > 0,
            "stats.ws_send_timeout_secs must be > 0, got {}",
            self.stats.ws_send_timeout_secs
        );
        Ok(())
    }
}
