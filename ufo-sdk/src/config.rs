//! Configuration for [`UfoSystem`](crate::UfoSystem)
//!
//! Defaults match a device reachable as `ufo` on the local network and a
//! catalog stored under `/data`, which is where the container image mounts
//! its volume.

use std::path::PathBuf;
use std::time::Duration;

use ufo_client::ClientConfig;
use ufo_state::{DEFAULT_EVENT_BUFFER, DEFAULT_STACK_DEPTH_WARNING};

use crate::error::{Result, SdkError};

/// Environment variable holding the device hostname or IP
pub const DEVICE_HOST_ENV: &str = "UFO_IP";

/// Environment variable holding the effect catalog path
pub const EFFECTS_FILE_ENV: &str = "UFO_EFFECTS_FILE";

/// Settings for the SDK facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UfoConfig {
    /// Hostname or IP of the device
    /// Default: "ufo"
    pub device_host: String,

    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Timeout for a whole device request
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// JSON file backing the effect catalog
    /// Default: /data/effects.json
    pub effects_path: PathBuf,

    /// Capacity of the event broadcast channel
    /// Default: 100
    pub event_buffer_size: usize,

    /// Effect stack depth at which pushes log a warning
    /// Default: 32
    pub stack_depth_warning: usize,
}

impl Default for UfoConfig {
    fn default() -> Self {
        Self {
            device_host: "ufo".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            effects_path: PathBuf::from("/data/effects.json"),
            event_buffer_size: DEFAULT_EVENT_BUFFER,
            stack_depth_warning: DEFAULT_STACK_DEPTH_WARNING,
        }
    }
}

impl UfoConfig {
    /// Defaults overridden by `UFO_IP` and `UFO_EFFECTS_FILE` when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup(DEVICE_HOST_ENV).filter(|v| !v.is_empty()) {
            config.device_host = host;
        }
        if let Some(path) = lookup(EFFECTS_FILE_ENV).filter(|v| !v.is_empty()) {
            config.effects_path = PathBuf::from(path);
        }
        config
    }

    pub fn with_device_host(mut self, host: impl Into<String>) -> Self {
        self.device_host = host.into();
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn with_effects_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.effects_path = path.into();
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_stack_depth_warning(mut self, depth: usize) -> Self {
        self.stack_depth_warning = depth;
        self
    }

    /// Transport settings for the device client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::for_host(&self.device_host)
            .with_timeouts(self.connect_timeout, self.request_timeout)
    }

    /// Reject settings the SDK cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device_host.trim().is_empty() {
            return Err(SdkError::Configuration(
                "Device host must not be empty".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(SdkError::Configuration(
                "Device timeouts must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(SdkError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.stack_depth_warning == 0 {
            return Err(SdkError::Configuration(
                "Stack depth warning must be greater than 0".to_string(),
            ));
        }

        if self.effects_path.as_os_str().is_empty() {
            return Err(SdkError::Configuration(
                "Effects path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = UfoConfig::default();
        assert_eq!(config.device_host, "ufo");
        assert_eq!(config.effects_path, PathBuf::from("/data/effects.json"));
        assert_eq!(config.event_buffer_size, 100);
        assert_eq!(config.stack_depth_warning, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (DEVICE_HOST_ENV, "192.168.1.50"),
            (EFFECTS_FILE_ENV, "/tmp/effects.json"),
        ]
        .into_iter()
        .collect();

        let config = UfoConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.device_host, "192.168.1.50");
        assert_eq!(config.effects_path, PathBuf::from("/tmp/effects.json"));
    }

    #[test]
    fn test_empty_env_values_keep_defaults() {
        let config = UfoConfig::from_lookup(|_| Some(String::new()));
        assert_eq!(config, UfoConfig::default());
    }

    #[test]
    fn test_client_config() {
        let config = UfoConfig::default()
            .with_device_host("10.0.0.7")
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(2));

        let client = config.client_config();
        assert_eq!(client.base_url, "http://10.0.0.7");
        assert_eq!(client.connect_timeout, Duration::from_secs(1));
        assert_eq!(client.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validation() {
        assert!(UfoConfig::default().with_device_host(" ").validate().is_err());
        assert!(UfoConfig::default().with_event_buffer_size(0).validate().is_err());
        assert!(UfoConfig::default().with_stack_depth_warning(0).validate().is_err());
        assert!(UfoConfig::default().with_effects_path("").validate().is_err());
        assert!(UfoConfig::default()
            .with_timeouts(Duration::ZERO, Duration::from_secs(1))
            .validate()
            .is_err());
    }
}
