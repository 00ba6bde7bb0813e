//! Configuration types for the isapi-stream crate
//!
//! [`DeviceConfig`] says where the device is and how to authenticate.
//! [`StreamConfig`] controls reconnect timing, stall detection, event
//! tracking and channel sizes.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Result, StreamError};

/// Path of the alert stream resource on the device.
pub const ALERT_STREAM_PATH: &str = "/ISAPI/Event/notification/alertStream";

/// Connection details for one device.
#[derive(Clone)]
pub struct DeviceConfig {
    /// Label used in logs
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Use `https` instead of `http`
    pub use_tls: bool,
    /// Verify the device certificate; devices usually ship self-signed ones
    pub strict_tls: bool,
    pub username: String,
    pub password: String,
}

impl DeviceConfig {
    /// Create a config for a plain-HTTP device on port 80.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            name: host.clone(),
            host,
            port: 80,
            use_tls: false,
            strict_tls: false,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tls(mut self, use_tls: bool, strict_tls: bool) -> Self {
        self.use_tls = use_tls;
        self.strict_tls = strict_tls;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }

    /// Full URL of the alert stream endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        let raw = format!(
            "{}://{}:{}{}",
            self.scheme(),
            self.host,
            self.port,
            ALERT_STREAM_PATH
        );
        Url::parse(&raw).map_err(|e| {
            StreamError::Configuration(format!("Invalid device address {raw}: {e}"))
        })
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StreamError::Configuration(
                "Device host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(StreamError::Configuration(
                "Device port must be greater than 0".to_string(),
            ));
        }

        if self.username.is_empty() {
            return Err(StreamError::Configuration(
                "Device username must not be empty".to_string(),
            ));
        }

        self.endpoint_url().map(|_| ())
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("strict_tls", &self.strict_tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for a [`StreamConnector`](crate::StreamConnector)
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Delay before reconnecting after the device closed the stream cleanly
    /// Default: 30 seconds
    pub reconnect_after_end: Duration,

    /// Delay before reconnecting after a connect failure, read error or stall
    /// Default: 60 seconds
    pub reconnect_after_error: Duration,

    /// Treat the stream as dead when no bytes arrive for this long
    /// Default: 90 seconds. `None` waits forever.
    pub idle_timeout: Option<Duration>,

    /// An active event not re-announced for longer than this is stopped
    /// Default: 2 seconds
    pub staleness_window: Duration,

    /// Timeout for establishing the TCP/TLS connection
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Timeout for the device to answer the request with response headers
    /// Default: 20 seconds
    pub response_timeout: Duration,

    /// Capacity of the signal channel created by `StreamConnector::with_channel`
    /// Default: 100
    pub event_buffer_size: usize,

    /// Largest notification document accepted before it is discarded
    /// Default: 64 KiB
    pub max_frame_bytes: usize,

    /// Log connection and per-frame details
    /// Default: false
    pub trace: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_after_end: Duration::from_secs(30),
            reconnect_after_error: Duration::from_secs(60),
            idle_timeout: Some(Duration::from_secs(90)),
            staleness_window: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(20),
            event_buffer_size: 100,
            max_frame_bytes: 64 * 1024,
            trace: false,
        }
    }
}

impl StreamConfig {
    /// Create a StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.staleness_window.is_zero() {
            return Err(StreamError::Configuration(
                "Staleness window must be greater than 0".to_string(),
            ));
        }

        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(StreamError::Configuration(
                "Idle timeout must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(StreamError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.response_timeout.is_zero() {
            return Err(StreamError::Configuration(
                "Response timeout must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(StreamError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_frame_bytes < 64 {
            return Err(StreamError::Configuration(
                "Max frame size must be at least 64 bytes".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_reconnect_delays(mut self, after_end: Duration, after_error: Duration) -> Self {
        self.reconnect_after_end = after_end;
        self.reconnect_after_error = after_error;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_max_frame_bytes(mut self, size: usize) -> Self {
        self.max_frame_bytes = size;
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.reconnect_after_end, Duration::from_secs(30));
        assert_eq!(config.reconnect_after_error, Duration::from_secs(60));
        assert_eq!(config.staleness_window, Duration::from_secs(2));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.response_timeout, Duration::from_secs(20));
        assert!(!config.trace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid = StreamConfig {
            staleness_window: Duration::ZERO,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid = StreamConfig::new().with_idle_timeout(Some(Duration::ZERO));
        assert!(invalid.validate().is_err());

        let invalid = StreamConfig::new().with_response_timeout(Duration::ZERO);
        assert!(invalid.validate().is_err());

        let invalid = StreamConfig::new().with_buffer_size(0);
        assert!(invalid.validate().is_err());

        let no_idle = StreamConfig::new().with_idle_timeout(None);
        assert!(no_idle.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StreamConfig::new()
            .with_reconnect_delays(Duration::from_millis(100), Duration::from_millis(200))
            .with_staleness_window(Duration::from_millis(500))
            .with_buffer_size(10)
            .with_trace(true);

        assert_eq!(config.reconnect_after_end, Duration::from_millis(100));
        assert_eq!(config.reconnect_after_error, Duration::from_millis(200));
        assert_eq!(config.staleness_window, Duration::from_millis(500));
        assert_eq!(config.event_buffer_size, 10);
        assert!(config.trace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url() {
        let device = DeviceConfig::new("192.168.1.64", "admin", "secret");
        // the default port is dropped from the serialized URL
        assert_eq!(
            device.endpoint_url().unwrap().as_str(),
            "http://192.168.1.64/ISAPI/Event/notification/alertStream"
        );

        let device = device.with_port(8443).with_tls(true, false);
        assert_eq!(
            device.endpoint_url().unwrap().as_str(),
            "https://192.168.1.64:8443/ISAPI/Event/notification/alertStream"
        );
    }

    #[test]
    fn test_device_validation() {
        assert!(DeviceConfig::new("nvr.local", "admin", "pw").validate().is_ok());
        assert!(DeviceConfig::new("", "admin", "pw").validate().is_err());
        assert!(DeviceConfig::new("nvr.local", "", "pw").validate().is_err());
        assert!(DeviceConfig::new("nvr.local", "admin", "pw")
            .with_port(0)
            .validate()
            .is_err());
        assert!(DeviceConfig::new("bad host", "admin", "pw").validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let device = DeviceConfig::new("cam", "admin", "hunter2").with_name("Front door");
        let debug = format!("{:?}", device);
        assert!(debug.contains("Front door"));
        assert!(!debug.contains("hunter2"));
    }
}
