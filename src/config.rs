//! Configuration types for download-sync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Socket session behavior
    #[serde(default)]
    pub sync: SyncConfig,

    /// Speed estimation
    #[serde(default)]
    pub speed: SpeedConfig,
}

impl Config {
    /// Check every setting, returning the first invalid one
    pub fn validate(&self) -> Result<()> {
        self.server.api_base()?;
        self.server.socket_base()?;

        if self.sync.push_interval.is_zero() {
            return Err(Error::config("sync.push_interval", "must be non-zero"));
        }
        if self.sync.event_buffer == 0 {
            return Err(Error::config("sync.event_buffer", "must be non-zero"));
        }
        if self.sync.frame_buffer == 0 {
            return Err(Error::config("sync.frame_buffer", "must be non-zero"));
        }
        if self.speed.smoothing.is_nan() || self.speed.smoothing < 1.0 {
            return Err(Error::config(
                "speed.smoothing",
                format!("must be at least 1, got {}", self.speed.smoothing),
            ));
        }

        Ok(())
    }

    /// Full URL of the download socket, including the `interval` query parameter
    pub fn socket_url(&self) -> Result<Url> {
        let interval = self.sync.push_interval.as_millis().to_string();
        crate::socket::endpoint_url(
            &self.server.socket_base()?,
            &self.sync.endpoint,
            [("interval", Some(interval))],
        )
    }
}

/// Agent endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the agent's HTTP API (default: "http://127.0.0.1:8000/")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL for sockets (default: `api_url` with `http` replaced by `ws`)
    #[serde(default)]
    pub socket_url: Option<String>,

    /// Timeout for HTTP requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            socket_url: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Parsed HTTP base URL
    pub fn api_base(&self) -> Result<Url> {
        Url::parse(&self.api_url).map_err(|e| Error::config("server.api_url", e.to_string()))
    }

    /// Parsed socket base URL
    pub fn socket_base(&self) -> Result<Url> {
        match &self.socket_url {
            Some(url) => {
                Url::parse(url).map_err(|e| Error::config("server.socket_url", e.to_string()))
            }
            None => {
                // https -> wss falls out of the prefix replacement
                let derived = match self.api_url.strip_prefix("http") {
                    Some(rest) => format!("ws{rest}"),
                    None => self.api_url.clone(),
                };
                Url::parse(&derived).map_err(|e| Error::config("server.api_url", e.to_string()))
            }
        }
    }
}

/// Socket session configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Socket endpoint, relative to the socket base (default: "download/")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Requested push frequency, sent as `interval` (default: 500 ms)
    #[serde(default = "default_push_interval", with = "duration_ms_serde")]
    pub push_interval: Duration,

    /// Capacity of the event broadcast channel (default: 256)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Inbound frames buffered ahead of the consumer (default: 64)
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,

    /// Drop a task from the registry once a `loaded` message names it (default: true)
    #[serde(default = "default_true")]
    pub retire_on_loaded: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            push_interval: default_push_interval(),
            event_buffer: default_event_buffer(),
            frame_buffer: default_frame_buffer(),
            retire_on_loaded: true,
        }
    }
}

/// Speed estimation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeedConfig {
    /// Smoothing constant K of the moving average (default: 5.0)
    ///
    /// Each sample moves the estimate by `1/K` of the distance to the
    /// instantaneous speed. Larger values are smoother and slower to react.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
        }
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_endpoint() -> String {
    "download/".to_string()
}

fn default_push_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_event_buffer() -> usize {
    256
}

fn default_frame_buffer() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_smoothing() -> f64 {
    crate::task::speed::DEFAULT_SMOOTHING
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
