//! HTTP transport for the UFO device
//!
//! The device exposes a single `GET /api?{query}` endpoint and never reports
//! state back. Queries are sent verbatim: `|` separators inside values must
//! reach the device un-escaped.
//!
//! [`DeviceClient`] is the seam the rest of the SDK talks through, so tests
//! can substitute a recording fake for [`UfoClient`].

mod error;

pub use error::{ClientError, Result};

use std::time::Duration;

use ufo_codec::{strip_query_prefix, RingCommand, CLEAR_QUERY};

/// Connection settings for [`UfoClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without trailing slash, e.g. `http://ufo`
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Overall timeout for one request
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_host("ufo")
    }
}

impl ClientConfig {
    /// Config for a device reachable at `host` (hostname or IP)
    pub fn for_host(host: &str) -> Self {
        Self {
            base_url: format!("http://{}", host),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }
}

/// Commands the SDK sends to the device
///
/// Only [`send_raw_query`](DeviceClient::send_raw_query) is required; the
/// other methods build their query and delegate to it.
pub trait DeviceClient: Send + Sync {
    /// Send a raw query and return the response body
    fn send_raw_query(&self, query: &str) -> Result<String>;

    fn set_brightness(&self, level: u8) -> Result<()> {
        self.send_raw_query(&format!("dim={}", level)).map(|_| ())
    }

    /// Set the logo to `on`, `off` or a pipe-delimited color pattern
    fn set_logo(&self, value: &str) -> Result<()> {
        self.send_raw_query(&format!("logo={}", value)).map(|_| ())
    }

    fn play_pattern(&self, pattern: &str) -> Result<()> {
        self.send_raw_query(pattern).map(|_| ())
    }

    fn set_ring_pattern(&self, command: &RingCommand) -> Result<()> {
        self.send_raw_query(&command.to_query()).map(|_| ())
    }

    /// Blank both rings and turn the logo off
    fn clear(&self) -> Result<()> {
        self.send_raw_query(CLEAR_QUERY).map(|_| ())
    }
}

/// Blocking client for the device's HTTP API
#[derive(Debug, Clone)]
pub struct UfoClient {
    agent: ureq::Agent,
    base_url: String,
}

impl Default for UfoClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl UfoClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(config.connect_timeout)
                .timeout(config.request_timeout)
                .build(),
            base_url: config.base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for a query; a leading `?` or `/` is dropped
    pub fn api_url(&self, query: &str) -> String {
        format!("{}/api?{}", self.base_url, strip_query_prefix(query))
    }
}

impl DeviceClient for UfoClient {
    fn send_raw_query(&self, query: &str) -> Result<String> {
        let url = self.api_url(query);
        tracing::debug!("GET {}", url);

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(ClientError::Status { code, body });
            }
            Err(e) => return Err(ClientError::Network(e.to_string())),
        };

        let code = response.status();
        let body = response
            .into_string()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if code != 200 {
            return Err(ClientError::Status { code, body });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dim=10", "http://ufo/api?dim=10")]
    #[case("?dim=10", "http://ufo/api?dim=10")]
    #[case("/dim=10", "http://ufo/api?dim=10")]
    #[case("top=0|3|FF0000", "http://ufo/api?top=0|3|FF0000")]
    #[case("", "http://ufo/api?")]
    fn test_api_url(#[case] query: &str, #[case] expected: &str) {
        assert_eq!(UfoClient::default().api_url(query), expected);
    }

    #[test]
    fn test_config_for_host() {
        let config = ClientConfig::for_host("192.168.1.50");
        assert_eq!(config.base_url, "http://192.168.1.50");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));

        let config = config.with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_error_messages() {
        let err = ClientError::Status {
            code: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "UFO returned status 500: boom");
        assert_eq!(
            ClientError::Network("timed out".to_string()).to_string(),
            "UFO request failed: timed out"
        );
    }
}
