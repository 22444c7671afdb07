use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [reconnect]
//                    max_attempts = 5
//
//   env var:         PARLEY_RECONNECT__MAX_ATTEMPTS=5   (double underscore = nesting)

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8790/";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,
    #[serde(default)]
    pub send: SendFileConfig,
}

/// Reconnection tunables (lives under `[reconnect]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconnectFileConfig {
    /// Retry budget after a lost connection. Once exhausted the client
    /// stays disconnected until an external trigger retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay grows linearly: attempt × step.
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for ReconnectFileConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_secs: default_backoff_step_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}

/// Send tunables (lives under `[send]` in config.toml).
///
/// Sends are fire-and-forget: no acknowledgment, no retry. `timeout_secs`
/// bounds only the hand-off to the transport and is absent by default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SendFileConfig {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_backoff_step_secs() -> u64 {
    1
}
fn default_backoff_cap_secs() -> u64 {
    30
}

/// Build a figment that layers: defaults → config.toml → PARLEY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `PARLEY_RECONNECT__MAX_ATTEMPTS=3`  →  `reconnect.max_attempts = 3`
///   `PARLEY_SERVER_URL=ws://host:1234/` →  `server_url = ...`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let toml_path = config_path.unwrap_or_else(|| Path::new("config.toml"));

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(toml_path))
        .merge(Env::prefixed("PARLEY_").split("__"))
}

/// Resolved connection configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    pub server_url: String,
    pub max_reconnect_attempts: u32,
    pub backoff_step: Duration,
    pub backoff_cap: Duration,
    pub send_timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            server_url: fc
                .server_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            max_reconnect_attempts: fc.reconnect.max_attempts,
            backoff_step: Duration::from_secs(fc.reconnect.backoff_step_secs),
            backoff_cap: Duration::from_secs(fc.reconnect.backoff_cap_secs),
            send_timeout: fc.send.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.backoff_step, Duration::from_secs(1));
        assert_eq!(config.backoff_cap, Duration::from_secs(30));
        assert!(config.send_timeout.is_none());
    }

    #[test]
    fn toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server_url = "ws://example.test:9000/"

[reconnect]
max_attempts = 2
backoff_step_secs = 3

[send]
timeout_secs = 10
"#
        )
        .unwrap();

        let fc: FileConfig = load_config(Some(file.path())).extract().unwrap();
        let config = ConnectionConfig::from_file(&fc);
        assert_eq!(config.server_url, "ws://example.test:9000/");
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.backoff_step, Duration::from_secs(3));
        // Untouched section keeps its default
        assert_eq!(config.backoff_cap, Duration::from_secs(30));
        assert_eq!(config.send_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let fc: FileConfig = load_config(Some(Path::new("/nonexistent/config.toml")))
            .extract()
            .unwrap();
        let config = ConnectionConfig::from_file(&fc);
        assert_eq!(config.max_reconnect_attempts, 5);
    }
}
