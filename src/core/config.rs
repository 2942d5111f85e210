//! Configuration management for the tracing client.
//!
//! This module provides configuration handling with:
//! - Programmatic construction via [`ConfigBuilder`]
//! - Environment variable overrides
//! - Validation and defaults

use crate::core::{Result, TracewireError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming the instrumented application.
pub const ENV_APP_NAME: &str = "TRACEWIRE_NAME";
/// Environment variable carrying the agent key/credential.
pub const ENV_KEY: &str = "TRACEWIRE_KEY";
/// Environment variable overriding the collector endpoint.
pub const ENV_SOCKET: &str = "TRACEWIRE_SOCKET";

/// Default Unix socket path of the collector agent.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tracewire-agent.sock";

/// Where the collector agent is listening.
///
/// Parsed from a string: anything starting with `tcp://` is a TCP address,
/// everything else is treated as a Unix socket path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AgentEndpoint {
    /// Unix domain socket path
    Unix(PathBuf),
    /// TCP socket address
    Tcp(SocketAddr),
}

impl Default for AgentEndpoint {
    fn default() -> Self {
        AgentEndpoint::Unix(PathBuf::from(DEFAULT_SOCKET_PATH))
    }
}

impl FromStr for AgentEndpoint {
    type Err = TracewireError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(TracewireError::endpoint("endpoint cannot be empty"));
        }
        if let Some(addr) = s.strip_prefix("tcp://") {
            let addr = addr.parse::<SocketAddr>().map_err(|e| {
                TracewireError::endpoint(format!("invalid TCP address '{}': {}", addr, e))
            })?;
            Ok(AgentEndpoint::Tcp(addr))
        } else {
            Ok(AgentEndpoint::Unix(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for AgentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentEndpoint::Unix(path) => write!(f, "{}", path.display()),
            AgentEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

impl From<AgentEndpoint> for String {
    fn from(endpoint: AgentEndpoint) -> Self {
        endpoint.to_string()
    }
}

impl TryFrom<String> for AgentEndpoint {
    type Error = TracewireError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Complete configuration for the tracing client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the instrumented application, reported in `Register`
    pub app_name: String,
    /// Agent key/credential, reported in `Register`
    pub key: String,
    /// Collector endpoint
    pub endpoint: AgentEndpoint,
    /// Transport configuration
    pub transport: TransportConfig,
    /// Tracker configuration
    pub tracker: TrackerConfig,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Capacity of the outbound frame queue; frames beyond it are dropped
    pub queue_capacity: usize,
    /// Deadline for a single connect attempt
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Deadline for a single frame write
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Minimum interval between reconnect attempts
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,
}

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of simultaneously active requests; the oldest entry
    /// is evicted when the cap is reached
    pub max_active_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app_name: String::new(),
            key: String::new(),
            endpoint: AgentEndpoint::default(),
            transport: TransportConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            queue_capacity: 1024,
            connect_timeout: Duration::from_millis(500),
            write_timeout: Duration::from_millis(250),
            reconnect_interval: Duration::from_secs(1),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            max_active_requests: 10_000,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.transport.queue_capacity == 0 {
            return Err(TracewireError::config("queue_capacity must be greater than 0"));
        }
        if self.transport.connect_timeout.is_zero() {
            return Err(TracewireError::config("connect_timeout must be greater than 0"));
        }
        if self.transport.write_timeout.is_zero() {
            return Err(TracewireError::config("write_timeout must be greater than 0"));
        }
        if self.tracker.max_active_requests == 0 {
            return Err(TracewireError::config(
                "max_active_requests must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Reads `TRACEWIRE_NAME`, `TRACEWIRE_KEY`, and `TRACEWIRE_SOCKET`;
    /// unset variables leave the current values untouched.
    pub fn from_env(mut self) -> Result<Self> {
        if let Ok(name) = std::env::var(ENV_APP_NAME) {
            self.config.app_name = name;
        }
        if let Ok(key) = std::env::var(ENV_KEY) {
            self.config.key = key;
        }
        if let Ok(endpoint) = std::env::var(ENV_SOCKET) {
            self.config.endpoint = endpoint.parse()?;
        }
        Ok(self)
    }

    /// Set the application name
    pub fn app_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.app_name = name.into();
        self
    }

    /// Set the agent key
    pub fn key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.key = key.into();
        self
    }

    /// Set the collector endpoint
    pub fn endpoint(mut self, endpoint: AgentEndpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Set the collector Unix socket path
    pub fn socket_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.endpoint = AgentEndpoint::Unix(path.into());
        self
    }

    /// Set the outbound queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.transport.queue_capacity = capacity;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.connect_timeout = timeout;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.write_timeout = timeout;
        self
    }

    /// Set the minimum interval between reconnect attempts
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.transport.reconnect_interval = interval;
        self
    }

    /// Set the active request cap
    pub fn max_active_requests(mut self, max: usize) -> Self {
        self.config.tracker.max_active_requests = max;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            "/tmp/agent.sock".parse::<AgentEndpoint>().unwrap(),
            AgentEndpoint::Unix(PathBuf::from("/tmp/agent.sock"))
        );
        assert_eq!(
            "tcp://127.0.0.1:6590".parse::<AgentEndpoint>().unwrap(),
            AgentEndpoint::Tcp("127.0.0.1:6590".parse().unwrap())
        );
        assert!("tcp://not-an-addr".parse::<AgentEndpoint>().is_err());
        assert!("".parse::<AgentEndpoint>().is_err());
    }

    #[test]
    fn test_endpoint_display_round_trip() {
        let endpoint: AgentEndpoint = "tcp://127.0.0.1:6590".parse().unwrap();
        assert_eq!(endpoint.to_string().parse::<AgentEndpoint>().unwrap(), endpoint);
    }

    #[test]
    fn test_builder_defaults_validate() {
        let config = ConfigBuilder::new()
            .app_name("MyApp")
            .key("KEY123")
            .build()
            .unwrap();
        assert_eq!(config.endpoint, AgentEndpoint::default());
        assert_eq!(config.transport.queue_capacity, 1024);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ConfigBuilder::new().queue_capacity(0).build().is_err());
        assert!(ConfigBuilder::new().max_active_requests(0).build().is_err());
        assert!(ConfigBuilder::new()
            .connect_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var(ENV_APP_NAME, "EnvApp");
        std::env::set_var(ENV_KEY, "EnvKey");
        std::env::set_var(ENV_SOCKET, "/run/agent.sock");
        let config = ConfigBuilder::new().from_env().unwrap().build().unwrap();
        assert_eq!(config.app_name, "EnvApp");
        assert_eq!(config.key, "EnvKey");
        assert_eq!(config.endpoint, AgentEndpoint::Unix(PathBuf::from("/run/agent.sock")));
        std::env::remove_var(ENV_APP_NAME);
        std::env::remove_var(ENV_KEY);
        std::env::remove_var(ENV_SOCKET);
    }
}
