//! Layered runtime configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `KEYSTONE__`-prefixed environment variables, e.g.
//! `KEYSTONE__GATEWAY__BASE_URL=https://api.example.com/api/v1`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use keystone_application::DEFAULT_REFRESH_PATH;
use keystone_domain::DecodePolicy;
use serde::{Deserialize, Serialize};
use url::Url;

const APP_DIR: &str = "keystone";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or did not match the expected shape.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The API base URL is not an absolute URL.
    #[error("invalid base URL '{url}': {message}")]
    InvalidBaseUrl {
        /// Configured value.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Where and how to reach the API service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL every request path is resolved against.
    pub base_url: String,
    /// Refresh endpoint path, relative to `base_url`.
    pub refresh_path: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            timeout_ms: 30_000,
            user_agent: format!("Keystone/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session file; defaults to `<data dir>/keystone/session.json`.
    pub storage_path: Option<PathBuf>,
    /// What to do with access credentials whose claims cannot be read.
    pub decode_policy: DecodePolicy,
}

impl SessionSettings {
    /// Resolves the session file location.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("session.json")
        })
    }
}

/// Navigation guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    /// Where unauthenticated navigation is sent.
    pub login_path: String,
    /// Route patterns reachable without a session; everything else is
    /// protected. Patterns are exact paths or end in `/*`.
    pub public_routes: Vec<String>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            public_routes: Vec::new(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoneConfig {
    /// API service settings.
    pub gateway: GatewaySettings,
    /// Session persistence settings.
    pub session: SessionSettings,
    /// Navigation guard settings.
    pub guard: GuardSettings,
}

impl KeystoneConfig {
    /// Loads configuration.
    ///
    /// With `path`, that file must exist. Without it,
    /// `<config dir>/keystone/config.toml` is read if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source is unreadable or malformed, or if
    /// the base URL does not parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(Self::default_path()).required(false),
        };

        let loaded: Self = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("KEYSTONE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Default configuration file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.gateway.base_url)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidBaseUrl {
                url: self.gateway.base_url.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = KeystoneConfig::default();
        assert_eq!(config.gateway.base_url, "http://localhost:8080/api/v1");
        assert_eq!(config.gateway.refresh_path, "/auth/refresh");
        assert_eq!(config.gateway.timeout_ms, 30_000);
        assert_eq!(config.session.decode_policy, DecodePolicy::Strict);
        assert_eq!(config.guard.login_path, "/login");
        assert!(config.session.storage_path().ends_with("keystone/session.json"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[gateway]
base_url = "https://erp.example.com/api/v1"
timeout_ms = 5000

[session]
storage_path = "/var/lib/keystone/session.json"
decode_policy = "lenient"

[guard]
public_routes = ["/notice/*", "/about"]
"#,
        );

        let config = KeystoneConfig::load(Some(&path)).unwrap();

        assert_eq!(config.gateway.base_url, "https://erp.example.com/api/v1");
        assert_eq!(config.gateway.timeout_ms, 5000);
        assert_eq!(config.gateway.refresh_path, "/auth/refresh");
        assert_eq!(config.session.decode_policy, DecodePolicy::Lenient);
        assert_eq!(
            config.session.storage_path(),
            PathBuf::from("/var/lib/keystone/session.json")
        );
        assert_eq!(config.guard.login_path, "/login");
        assert_eq!(config.guard.public_routes, vec!["/notice/*", "/about"]);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let result = KeystoneConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_relative_base_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[gateway]\nbase_url = \"/api/v1\"\n");

        let result = KeystoneConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::InvalidBaseUrl { .. })));
    }
}
