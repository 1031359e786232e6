use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MOUNT_PATH: &str = "/convert";

// Chrome on Windows; some file hosts serve an HTML interstitial to unknown agents
pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port '{0}': expected an integer between 0 and 65535")]
    InvalidPort(String),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddr(String),

    #[error("invalid mount path '{0}': route parameters and wildcards are not allowed")]
    InvalidMountPath(String),
}

/// Outbound HTTP settings for the document fetcher.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 5,
            user_agent: BROWSER_UA.to_string(),
        }
    }
}

/// Server configuration, built once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Shared secret expected in `x-api-key`. `None` makes every request fail with a
    /// configuration error instead of stopping the process.
    pub api_key: Option<String>,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub mount_path: String,
    /// Include the raw error description as `details` in fetch/extraction error bodies.
    pub error_details: bool,
    pub fetch: FetchSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            error_details: true,
            fetch: FetchSettings::default(),
        }
    }
}

/// Values supplied on the command line; each one wins over its environment variable.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub port: Option<String>,
    pub bind_addr: Option<String>,
    pub mount_path: Option<String>,
    pub hide_error_details: bool,
}

impl GatewayConfig {
    /// Resolves the configuration from CLI overrides, falling back to `env` lookups
    /// (`API_KEY`, `PORT`, `BIND_ADDR`, `MOUNT_PATH`) and then to defaults.
    pub fn resolve<F>(overrides: ConfigOverrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // An empty secret counts as unset
        let api_key = overrides
            .api_key
            .or_else(|| env("API_KEY"))
            .filter(|key| !key.is_empty());

        let port = match overrides.port.or_else(|| env("PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => defaults.port,
        };

        let bind_addr = match overrides.bind_addr.or_else(|| env("BIND_ADDR")) {
            Some(raw) => raw
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidBindAddr(raw.clone()))?,
            None => defaults.bind_addr,
        };

        let mount_path = match overrides.mount_path.or_else(|| env("MOUNT_PATH")) {
            Some(raw) => normalize_mount_path(&raw)?,
            None => defaults.mount_path,
        };

        Ok(Self {
            api_key,
            bind_addr,
            port,
            mount_path,
            error_details: !overrides.hide_error_details,
            fetch: defaults.fetch,
        })
    }
}

/// The mount path is a literal route; `:` and `*` would make the router
/// treat it as a capture or wildcard.
fn normalize_mount_path(path: &str) -> Result<String, ConfigError> {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.contains([':', '*']) {
        return Err(ConfigError::InvalidMountPath(path.to_string()));
    }
    if trimmed.is_empty() {
        return Ok(DEFAULT_MOUNT_PATH.to_string());
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{}", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = GatewayConfig::resolve(ConfigOverrides::default(), env_from(&[])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.mount_path, "/convert");
        assert!(config.error_details);
        assert_eq!(config.fetch.timeout, Duration::from_secs(10));
        assert_eq!(config.fetch.max_redirects, 5);
    }

    #[test]
    fn reads_environment() {
        let env = env_from(&[
            ("API_KEY", "secret"),
            ("PORT", "8081"),
            ("MOUNT_PATH", "api/convert/"),
            ("BIND_ADDR", "127.0.0.1"),
        ]);
        let config = GatewayConfig::resolve(ConfigOverrides::default(), env).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.port, 8081);
        assert_eq!(config.mount_path, "/api/convert");
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn cli_overrides_win_over_environment() {
        let overrides = ConfigOverrides {
            api_key: Some("from-cli".to_string()),
            port: Some("9000".to_string()),
            hide_error_details: true,
            ..Default::default()
        };
        let env = env_from(&[("API_KEY", "from-env"), ("PORT", "8081")]);
        let config = GatewayConfig::resolve(overrides, env).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-cli"));
        assert_eq!(config.port, 9000);
        assert!(!config.error_details);
    }

    #[test]
    fn empty_api_key_is_unset() {
        let config =
            GatewayConfig::resolve(ConfigOverrides::default(), env_from(&[("API_KEY", "")]))
                .unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn rejects_bad_port_and_bind_addr() {
        let err = GatewayConfig::resolve(ConfigOverrides::default(), env_from(&[("PORT", "http")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("http".to_string()));

        let err = GatewayConfig::resolve(
            ConfigOverrides::default(),
            env_from(&[("BIND_ADDR", "localhost:80")]),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidBindAddr("localhost:80".to_string()));
    }

    #[test]
    fn mount_path_gets_leading_slash() {
        assert_eq!(normalize_mount_path("convert").unwrap(), "/convert");
        assert_eq!(normalize_mount_path("/api/convert").unwrap(), "/api/convert");
        assert_eq!(normalize_mount_path("/").unwrap(), "/convert");
    }

    #[test]
    fn rejects_mount_path_with_wildcard_or_capture() {
        for raw in ["/api/*", "/api/*rest", "/:id/convert", "api/convert:v2"] {
            let err = GatewayConfig::resolve(
                ConfigOverrides::default(),
                env_from(&[("MOUNT_PATH", raw)]),
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::InvalidMountPath(raw.to_string()));
        }

        let overrides = ConfigOverrides {
            mount_path: Some("/files/*".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            GatewayConfig::resolve(overrides, env_from(&[])),
            Err(ConfigError::InvalidMountPath(_))
        ));
    }
}
