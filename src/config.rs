// ABOUTME: Broker configuration from a TOML file with environment variable overrides.
// ABOUTME: Provides sensible defaults so the broker runs with no config at all.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub dispatch: DispatchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Socket address the broker binds both gRPC surfaces to.
    #[serde(default = "default_listen_addr")]
    pub addr: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DispatchSettings {
    /// Optional per-branch timeout in seconds. Unset means a wedged handler
    /// may stall its own branch indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_timeout_secs: Option<u64>,
}

impl DispatchSettings {
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration, lowest precedence first: built-in defaults, then
    /// the TOML file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", p.display()))?
            }
            None => Self::default(),
        };

        if let Ok(addr) = std::env::var("CHATBOT_LISTEN_ADDR") {
            config.listen.addr = addr;
        }
        if let Ok(secs) = std::env::var("CHATBOT_HANDLER_TIMEOUT_SECS") {
            config.dispatch.handler_timeout_secs =
                Some(secs.parse().context("parsing CHATBOT_HANDLER_TIMEOUT_SECS")?);
        }

        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write as _;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.listen.addr, "0.0.0.0:8080");
        assert!(config.dispatch.handler_timeout().is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [listen]
            addr = "127.0.0.1:9999"

            [dispatch]
            handler_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.listen.addr, "127.0.0.1:9999");
        assert_eq!(
            config.dispatch.handler_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listen]\naddr = \"10.1.2.3:4000\"").unwrap();

        std::env::remove_var("CHATBOT_LISTEN_ADDR");
        std::env::remove_var("CHATBOT_HANDLER_TIMEOUT_SECS");

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.listen.addr, "10.1.2.3:4000");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listen]\naddr = \"10.1.2.3:4000\"").unwrap();

        std::env::set_var("CHATBOT_LISTEN_ADDR", "0.0.0.0:7777");
        std::env::set_var("CHATBOT_HANDLER_TIMEOUT_SECS", "5");

        let config = Config::load(Some(file.path())).unwrap();
        std::env::remove_var("CHATBOT_LISTEN_ADDR");
        std::env::remove_var("CHATBOT_HANDLER_TIMEOUT_SECS");

        assert_eq!(config.listen.addr, "0.0.0.0:7777");
        assert_eq!(config.dispatch.handler_timeout_secs, Some(5));
    }
}
