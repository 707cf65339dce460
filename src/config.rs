use crate::models::ResourceKind;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// `dashsync/<version>`, sent when `client.user_agent` is not set.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    pub connect_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often the binary logs per-resource sync stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub kind: ResourceKind,
    pub endpoint: String,
    pub poll_interval_ms: u64,
    /// Keep only the newest N entries of each fetched list. Unbounded when omitted.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// A resource as the sync loop consumes it.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub endpoint: Url,
    pub poll_interval: Duration,
    pub max_entries: Option<usize>,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        endpoint: Url,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint,
            poll_interval,
            max_entries: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Resources converted for the sync loop, in config order.
    pub fn resources(&self) -> anyhow::Result<Vec<Resource>> {
        self.resources
            .iter()
            .map(|r| {
                Ok(Resource {
                    name: r.name.clone(),
                    kind: r.kind,
                    endpoint: parse_endpoint(&r.endpoint)?,
                    poll_interval: Duration::from_millis(r.poll_interval_ms),
                    max_entries: r.max_entries,
                })
            })
            .collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.resources.is_empty(),
            "resources must contain at least one entry"
        );
        let mut names = HashSet::new();
        for r in &self.resources {
            anyhow::ensure!(!r.name.is_empty(), "resources.name must be non-empty");
            anyhow::ensure!(
                names.insert(r.name.as_str()),
                "resources.name must be unique, got duplicate {:?}",
                r.name
            );
            parse_endpoint(&r.endpoint)
                .map_err(|e| anyhow::anyhow!("resources.endpoint for {:?}: {}", r.name, e))?;
            anyhow::ensure!(
                r.poll_interval_ms > 0,
                "resources.poll_interval_ms for {:?} must be > 0, got {}",
                r.name,
                r.poll_interval_ms
            );
            if let Some(max) = r.max_entries {
                anyhow::ensure!(
                    max > 0,
                    "resources.max_entries for {:?} must be > 0, got {}",
                    r.name,
                    max
                );
            }
        }
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        if let Some(ms) = self.client.connect_timeout_ms {
            anyhow::ensure!(
                ms > 0,
                "client.connect_timeout_ms must be > 0, got {}",
                ms
            );
        }
        Ok(())
    }
}

fn parse_endpoint(s: &str) -> anyhow::Result<Url> {
    let url = Url::parse(s)?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "scheme must be http or https, got {}",
        url.scheme()
    );
    Ok(url)
}
