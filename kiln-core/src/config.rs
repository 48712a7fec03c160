use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level client configuration.
///
/// Bundles transport-level connection settings and default-plugin settings
/// into one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service name, used in log records and as a mock-registry selector.
    #[serde(default = "default_name")]
    pub name: String,

    /// Base path every endpoint's `path` template is joined onto.
    #[serde(default)]
    pub base_path: String,

    /// Transport-level connection settings.
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Default settings for bundled plugins, applied when a caller builds a
    /// client from this document instead of constructing plugins by hand.
    #[serde(default)]
    pub defaults: PluginDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connect timeout, seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,

    /// Max idle connections kept open per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Idle connection timeout, seconds.
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: f64,

    /// Accept invalid (self-signed/expired) TLS certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDefaults {
    /// Default tracking-token prefix.
    #[serde(default)]
    pub tracking_token_prefix: String,

    /// Default tracking-token length.
    #[serde(default = "default_tracking_token_length")]
    pub tracking_token_length: usize,

    /// Default per-call timeout, seconds. `None` disables the Timeout
    /// plugin's default (an endpoint or call can still set its own).
    #[serde(default)]
    pub timeout_secs: Option<f64>,

    /// Default connection pool concurrency limit.
    #[serde(default = "default_pool_limit")]
    pub pool_limit: usize,

    /// Maximum logged body length, characters. 0 means no truncation.
    #[serde(default)]
    pub max_body_length: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            pool_max_idle_per_host: default_pool_max_idle(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for PluginDefaults {
    fn default() -> Self {
        Self {
            tracking_token_prefix: String::new(),
            tracking_token_length: default_tracking_token_length(),
            timeout_secs: None,
            pool_limit: default_pool_limit(),
            max_body_length: 0,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_path: String::new(),
            connector: ConnectorConfig::default(),
            defaults: PluginDefaults::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional YAML file, overridden by
    /// `KILN_`-prefixed environment variables (e.g. `KILN_DEFAULTS__POOL_LIMIT`).
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("KILN_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }
}

fn default_name() -> String {
    "GenericService".to_string()
}

fn default_connect_timeout() -> f64 {
    6.0
}

fn default_pool_max_idle() -> usize {
    32
}

fn default_pool_idle_timeout() -> f64 {
    90.0
}

fn default_tracking_token_length() -> usize {
    10
}

fn default_pool_limit() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.name, "GenericService");
        assert_eq!(cfg.connector.pool_max_idle_per_host, 32);
        assert_eq!(cfg.defaults.tracking_token_length, 10);
        assert_eq!(cfg.defaults.pool_limit, 1);
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let cfg = ClientConfig::load(None).unwrap();
        assert_eq!(cfg.name, "GenericService");
    }
}
