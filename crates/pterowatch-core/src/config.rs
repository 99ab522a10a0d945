//! pterowatch.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{Endpoint, Policy};

/// Environment variable consulted when `panel.token` is absent.
pub const TOKEN_ENV: &str = "PTEROWATCH_TOKEN";

/// Timeout applied to panel requests when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub panel: PanelConfig,
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub defaults: PolicyOverrides,
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSection {
    /// Add every server visible to the API token at startup.
    #[serde(default)]
    pub discover: bool,
    pub probe_timeout: Option<String>,
}

/// Optional policy keys, used both for `[defaults]` and per server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverrides {
    pub scan_interval: Option<String>,
    pub max_failures: Option<u32>,
    pub max_restarts: Option<u32>,
    pub restart_cooldown: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub listen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub policy: PolicyOverrides,
}

fn default_enabled() -> bool {
    true
}

impl PolicyOverrides {
    /// Layer these overrides on top of `base`.
    pub fn resolve(&self, base: &Policy, scope: &str) -> ConfigResult<Policy> {
        let policy = Policy {
            scan_interval: duration_field(&self.scan_interval, base.scan_interval, scope, "scan_interval")?,
            max_failures: self.max_failures.unwrap_or(base.max_failures),
            max_restarts: self.max_restarts.unwrap_or(base.max_restarts),
            restart_cooldown: duration_field(
                &self.restart_cooldown,
                base.restart_cooldown,
                scope,
                "restart_cooldown",
            )?,
        };
        policy.check().map_err(|reason| ConfigError::Policy {
            server: scope.to_string(),
            reason,
        })?;
        Ok(policy)
    }
}

impl ServerEntry {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.ip.clone(), self.port)
    }

    /// Effective policy for this server given the resolved `[defaults]`.
    pub fn policy(&self, defaults: &Policy) -> ConfigResult<Policy> {
        self.policy.resolve(defaults, &self.id)
    }
}

impl WatchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a configuration document.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: WatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the watcher cannot start with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.panel.url.trim().is_empty() {
            return Err(ConfigError::MissingPanelUrl);
        }
        self.request_timeout()?;
        self.probe_timeout()?;
        let defaults = self.default_policy()?;

        let mut seen = HashSet::new();
        for (index, server) in self.servers.iter().enumerate() {
            if server.id.trim().is_empty() {
                return Err(ConfigError::EmptyId { index });
            }
            if !seen.insert(server.id.as_str()) {
                return Err(ConfigError::DuplicateId(server.id.clone()));
            }
            server.policy(&defaults)?;
        }
        Ok(())
    }

    /// The `[defaults]` table layered over the built-in policy.
    pub fn default_policy(&self) -> ConfigResult<Policy> {
        self.defaults.resolve(&Policy::default(), "defaults")
    }

    pub fn request_timeout(&self) -> ConfigResult<Duration> {
        duration_field(&self.panel.timeout, DEFAULT_REQUEST_TIMEOUT, "panel", "timeout")
    }

    pub fn probe_timeout(&self) -> ConfigResult<Duration> {
        duration_field(&self.watch.probe_timeout, DEFAULT_REQUEST_TIMEOUT, "watch", "probe_timeout")
    }

    /// API token from the file, falling back to `PTEROWATCH_TOKEN`.
    pub fn token(&self) -> Option<String> {
        self.panel
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()))
    }
}

fn duration_field(
    value: &Option<String>,
    fallback: Duration,
    scope: &str,
    field: &str,
) -> ConfigResult<Duration> {
    match value {
        None => Ok(fallback),
        Some(raw) => parse_duration(raw).ok_or_else(|| ConfigError::Duration {
            field: format!("{scope}.{field}"),
            value: raw.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
[panel]
url = "https://panel.example.com"
token = "ptlc_abc"
timeout = "3s"

[watch]
discover = true
probe_timeout = "4s"

[defaults]
scan_interval = "10s"
max_failures = 3

[api]
listen = "127.0.0.1:8090"

[[servers]]
id = "a1b2c3d4"
ip = "10.0.0.5"
port = 27015

[[servers]]
id = "e5f6a7b8"
enabled = false
max_restarts = 0
restart_cooldown = "2m"
"#;

    #[test]
    fn parse_full_config() {
        let config = WatchConfig::parse(FULL).unwrap();
        assert_eq!(config.panel.url, "https://panel.example.com");
        assert!(config.watch.discover);
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(3));
        assert_eq!(config.probe_timeout().unwrap(), Duration::from_secs(4));
        assert_eq!(config.api.as_ref().unwrap().listen, "127.0.0.1:8090");
        assert_eq!(config.servers.len(), 2);
        assert!(config.servers[0].enabled);
        assert!(!config.servers[1].enabled);
    }

    #[test]
    fn server_policy_layers_over_defaults() {
        let config = WatchConfig::parse(FULL).unwrap();
        let defaults = config.default_policy().unwrap();
        assert_eq!(defaults.scan_interval, Duration::from_secs(10));
        assert_eq!(defaults.max_failures, 3);
        assert_eq!(defaults.max_restarts, 2);

        let second = config.servers[1].policy(&defaults).unwrap();
        assert_eq!(second.scan_interval, Duration::from_secs(10));
        assert_eq!(second.max_restarts, 0);
        assert_eq!(second.restart_cooldown, Duration::from_secs(120));
        assert_eq!(config.servers[0].endpoint().to_string(), "10.0.0.5:27015");
    }

    #[test]
    fn parse_minimal() {
        let config = WatchConfig::parse("[panel]\nurl = \"http://localhost\"\n").unwrap();
        assert!(config.servers.is_empty());
        assert!(!config.watch.discover);
        assert!(config.api.is_none());
        assert_eq!(config.default_policy().unwrap(), Policy::default());
        assert_eq!(config.probe_timeout().unwrap(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let toml_str = r#"
[panel]
url = "http://localhost"

[[servers]]
id = "abc"

[[servers]]
id = "abc"
"#;
        let err = WatchConfig::parse(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateId(id) if id == "abc"));
    }

    #[test]
    fn empty_id_is_rejected() {
        let toml_str = "[panel]\nurl = \"http://localhost\"\n[[servers]]\nid = \"\"\n";
        let err = WatchConfig::parse(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyId { index: 0 }));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let toml_str = "[panel]\nurl = \"http://localhost\"\n[[servers]]\nid = \"abc\"\nmax_failures = 0\n";
        let err = WatchConfig::parse(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Policy { server, .. } if server == "abc"));
    }

    #[test]
    fn bad_duration_names_the_field() {
        let toml_str = "[panel]\nurl = \"http://localhost\"\n[defaults]\nscan_interval = \"often\"\n";
        let err = WatchConfig::parse(toml_str).unwrap_err();
        match err {
            ConfigError::Duration { field, value } => {
                assert_eq!(field, "defaults.scan_interval");
                assert_eq!(value, "often");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_panel_url_is_rejected() {
        let err = WatchConfig::parse("[panel]\nurl = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingPanelUrl));
    }

    #[test]
    fn from_file_reads_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = WatchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.servers[0].id, "a1b2c3d4");
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let err = WatchConfig::from_file(Path::new("/nonexistent/pterowatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn config_token_wins_over_env() {
        let config = WatchConfig::parse(FULL).unwrap();
        assert_eq!(config.token().as_deref(), Some("ptlc_abc"));
    }
}
