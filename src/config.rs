//! Publisher configuration
//!
//! Built once at startup and handed to [`crate::JetStreamLog::connect`] and
//! [`crate::StreamPublisher::new`]. Nothing on the publish path reads the
//! environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Connection and routing configuration for event publication
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    /// Log store URL (e.g., "nats://localhost:4222")
    pub url: String,

    /// Prefix prepended to every stream name, separating environments
    pub key_prefix: Option<String>,

    /// Stream used when a publish call names no channel
    pub default_stream: String,

    /// Stream receiving events whose primary append failed
    pub dead_letter_stream: String,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Read/write (append acknowledgement) timeout in milliseconds
    pub io_timeout_ms: u64,

    /// Check the log store while connecting and fail if it is unreachable
    pub verify_on_boot: bool,

    /// Create the default and dead-letter streams when missing
    pub ensure_streams: bool,

    /// Retention applied to streams created by this crate
    pub stream_max_age_secs: u64,

    /// Size cap in bytes for streams created by this crate (-1 for unlimited)
    pub stream_max_bytes: i64,

    /// Schema URI placed in each envelope's `dataschema`
    pub data_schema: String,

    /// Producer identifier placed in each envelope's `source`
    pub source: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            key_prefix: None,
            default_stream: "distribucion.bloques".to_string(),
            dead_letter_stream: "distribucion.bloques.dlq".to_string(),
            connect_timeout_ms: 1500,
            io_timeout_ms: 1500,
            verify_on_boot: true,
            ensure_streams: true,
            stream_max_age_secs: 86400 * 7,
            stream_max_bytes: 1_073_741_824, // 1GB
            data_schema:
                "https://contracts.logistrack/schemas/BlockConsolidated/1.2/schema.json"
                    .to_string(),
            source: "logistrack://distribucion".to_string(),
        }
    }
}

impl PublisherConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config("URL cannot be empty".to_string()));
        }

        if self.default_stream.is_empty() {
            return Err(Error::Config("Default stream cannot be empty".to_string()));
        }

        if self.dead_letter_stream.is_empty() {
            return Err(Error::Config(
                "Dead-letter stream cannot be empty".to_string(),
            ));
        }

        if self.dead_letter_stream == self.default_stream {
            return Err(Error::Config(
                "Dead-letter stream must differ from the default stream".to_string(),
            ));
        }

        if self.source.is_empty() {
            return Err(Error::Config("Source cannot be empty".to_string()));
        }

        if self.connect_timeout_ms == 0 || self.io_timeout_ms == 0 {
            return Err(Error::Config("Timeouts must be non-zero".to_string()));
        }

        if self.stream_max_bytes == 0 || self.stream_max_bytes < -1 {
            return Err(Error::Config(
                "Stream size cap must be positive or -1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create configuration from environment variables
    ///
    /// # Environment Variables
    /// - `EVENTS_URL`: log store URL
    /// - `EVENTS_KEY_PREFIX`: stream name prefix (optional)
    /// - `EVENTS_STREAM` / `EVENTS_DLQ_STREAM`: default and dead-letter streams
    /// - `EVENTS_CONNECT_TIMEOUT_MS` / `EVENTS_IO_TIMEOUT_MS`: timeouts
    /// - `EVENTS_VERIFY_ON_BOOT` / `EVENTS_ENSURE_STREAMS`: boot behaviour
    /// - `EVENTS_STREAM_MAX_AGE_SECS` / `EVENTS_STREAM_MAX_BYTES`: retention
    ///   and size cap for created streams
    /// - `CONTRACT_DATA_SCHEMA`: envelope `dataschema`
    /// - `SOURCE_URI`: envelope `source`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            url: std::env::var("EVENTS_URL").unwrap_or(defaults.url),
            key_prefix: std::env::var("EVENTS_KEY_PREFIX")
                .ok()
                .filter(|p| !p.is_empty()),
            default_stream: std::env::var("EVENTS_STREAM").unwrap_or(defaults.default_stream),
            dead_letter_stream: std::env::var("EVENTS_DLQ_STREAM")
                .unwrap_or(defaults.dead_letter_stream),
            connect_timeout_ms: parse_var("EVENTS_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout_ms),
            io_timeout_ms: parse_var("EVENTS_IO_TIMEOUT_MS").unwrap_or(defaults.io_timeout_ms),
            verify_on_boot: parse_var("EVENTS_VERIFY_ON_BOOT").unwrap_or(defaults.verify_on_boot),
            ensure_streams: parse_var("EVENTS_ENSURE_STREAMS").unwrap_or(defaults.ensure_streams),
            stream_max_age_secs: parse_var("EVENTS_STREAM_MAX_AGE_SECS")
                .unwrap_or(defaults.stream_max_age_secs),
            stream_max_bytes: parse_var("EVENTS_STREAM_MAX_BYTES")
                .unwrap_or(defaults.stream_max_bytes),
            data_schema: std::env::var("CONTRACT_DATA_SCHEMA").unwrap_or(defaults.data_schema),
            source: std::env::var("SOURCE_URI").unwrap_or(defaults.source),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn stream_max_age(&self) -> Duration {
        Duration::from_secs(self.stream_max_age_secs)
    }

    /// Prefix normalised to end in exactly one `.`, or `None` when unset
    pub fn normalized_prefix(&self) -> Option<String> {
        let prefix = self.key_prefix.as_deref()?.trim_end_matches([':', '.']);
        if prefix.is_empty() {
            None
        } else {
            Some(format!("{prefix}."))
        }
    }

    /// Log subject for a stream name, with the key prefix applied
    pub fn subject_for(&self, stream: &str) -> String {
        match self.normalized_prefix() {
            Some(prefix) => format!("{prefix}{stream}"),
            None => stream.to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
