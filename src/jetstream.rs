//! JetStream-backed append-only log
//!
//! [`JetStreamLog::connect`] is the connection factory: it applies the
//! configured timeouts and key prefix, optionally checks that the server
//! answers, and makes sure the default and dead-letter streams exist.
//! Without the boot check, stream creation is deferred to the first append on each stream.
//!
//! Each record maps onto one JetStream message. The `data` field is the
//! payload and every other field travels as a header of the same name.
//! The stream sequence from the publish acknowledgement is the record id.

use async_nats::{jetstream, Client, HeaderMap};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AppendError, Error, Result};
use crate::log::{RecordId, StreamLog, DATA_FIELD};
use crate::PublisherConfig;

/// JetStream client wrapper implementing [`StreamLog`]
pub struct JetStreamLog {
    client: Client,
    context: jetstream::Context,
    config: PublisherConfig,
    /// Streams still to be created before their first append
    pending: Mutex<HashSet<String>>,
}

impl JetStreamLog {
    /// Connect to the log store described by `config`
    ///
    /// With `verify_on_boot` the connection must succeed and a JetStream
    /// round trip must answer within the connect timeout, otherwise
    /// [`Error::Connection`] is returned before anything is published; the
    /// default and dead-letter streams are then created right away.
    ///
    /// Without it nothing touches the network here: the client keeps
    /// connecting in the background, stream creation waits for the first
    /// append to each stream, and an unreachable server shows up as an
    /// [`AppendError`]. No retry is attempted either way.
    ///
    /// # Errors
    /// - [`Error::Config`] when `config` does not validate
    /// - [`Error::Connection`] when the server refuses the connection, the
    ///   health check fails, or a stream cannot be created at boot
    pub async fn connect(config: PublisherConfig) -> Result<Self> {
        config.validate()?;

        let mut options = async_nats::ConnectOptions::new()
            .connection_timeout(config.connect_timeout())
            .request_timeout(Some(config.io_timeout()));
        if !config.verify_on_boot {
            options = options.retry_on_initial_connect();
        }

        let client = options
            .connect(config.url.as_str())
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", config.url, e)))?;

        let mut context = jetstream::new(client.clone());
        context.set_timeout(config.io_timeout());

        let log = Self {
            client,
            context,
            config,
            pending: Mutex::new(HashSet::new()),
        };

        if log.config.verify_on_boot {
            log.ping().await?;
        }

        tracing::info!(
            url = %log.config.url,
            prefix = ?log.config.normalized_prefix(),
            verified = log.config.verify_on_boot,
            "Connected to event log"
        );

        if log.config.ensure_streams {
            let streams = [
                log.config.default_stream.clone(),
                log.config.dead_letter_stream.clone(),
            ];
            if log.config.verify_on_boot {
                for stream in &streams {
                    log.ensure_stream(stream).await?;
                }
            } else {
                log.pending_streams().extend(streams);
            }
        }

        Ok(log)
    }

    /// Lightweight health check: one JetStream account-info round trip
    ///
    /// Bounded by the connect timeout.
    ///
    /// # Test Reference
    /// - Test: `src/jetstream.rs::tests::test_verify_on_boot_fails_fast_when_unreachable`
    pub async fn ping(&self) -> Result<()> {
        let timeout = self.config.connect_timeout();

        match tokio::time::timeout(timeout, self.context.query_account()).await {
            Ok(Ok(_)) => {
                tracing::debug!(url = %self.config.url, "Event log answered health check");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Connection(format!(
                "health check against {} failed: {}",
                self.config.url, e
            ))),
            Err(_) => Err(Error::Connection(format!(
                "health check against {} timed out after {:?}",
                self.config.url, timeout
            ))),
        }
    }

    /// Ensure a JetStream stream captures the subject of `stream`
    pub async fn ensure_stream(&self, stream: &str) -> Result<()> {
        let subject = self.config.subject_for(stream);
        let name = jetstream_name(&subject);

        tracing::debug!(stream = %name, subject = %subject, "Ensuring JetStream stream exists");

        let stream_config = StreamConfigBuilder::new(name.clone())
            .subject(subject.clone())
            .max_age(self.config.stream_max_age())
            .max_bytes(self.config.stream_max_bytes)
            .build();

        self.context
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| Error::Connection(format!("Failed to ensure stream '{}': {}", name, e)))?;

        tracing::info!(stream = %name, subject = %subject, "Stream ready");

        Ok(())
    }

    /// Get a reference to the underlying NATS client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Streams whose creation was deferred and has not succeeded yet
    pub fn deferred_streams(&self) -> Vec<String> {
        let mut streams: Vec<String> = self.pending_streams().iter().cloned().collect();
        streams.sort();
        streams
    }

    fn pending_streams(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn ensure_deferred(&self, stream: &str) -> std::result::Result<(), AppendError> {
        let deferred = self.pending_streams().contains(stream);
        if !deferred {
            return Ok(());
        }

        self.ensure_stream(stream)
            .await
            .map_err(|e| AppendError::new(stream, e))?;
        self.pending_streams().remove(stream);

        Ok(())
    }
}

#[async_trait]
impl StreamLog for JetStreamLog {
    async fn append(
        &self,
        stream: &str,
        fields: &[(&str, &str)],
    ) -> std::result::Result<RecordId, AppendError> {
        self.ensure_deferred(stream).await?;

        let subject = self.config.subject_for(stream);

        let mut payload = None;
        let mut headers = HeaderMap::new();
        for (name, value) in fields {
            if *name == DATA_FIELD {
                payload = Some(value.to_string());
            } else {
                headers.insert(*name, header_value(value).as_str());
            }
        }
        let payload = payload.unwrap_or_default();

        tracing::debug!(
            subject = %subject,
            payload_size = payload.len(),
            "Appending record to JetStream"
        );

        let ack = self
            .context
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| AppendError::new(stream, format!("Failed to publish: {}", e)))?;

        let ack = ack
            .await
            .map_err(|e| AppendError::new(stream, format!("Failed to get ack: {}", e)))?;

        tracing::debug!(
            subject = %subject,
            jetstream = %ack.stream,
            sequence = ack.sequence,
            "Record acknowledged"
        );

        Ok(RecordId(ack.sequence))
    }
}

/// JetStream stream name for a subject: `staging.distribucion.bloques` becomes
/// `STAGING_DISTRIBUCION_BLOQUES`
pub fn jetstream_name(subject: &str) -> String {
    subject
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

// Header values are single-line.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Stream configuration builder
pub struct StreamConfigBuilder {
    name: String,
    subjects: Vec<String>,
    max_messages: i64,
    max_bytes: i64,
    max_age: Duration,
}

impl StreamConfigBuilder {
    /// Create a new stream config builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subjects: Vec::new(),
            max_messages: -1,
            max_bytes: 1_073_741_824, // 1GB
            max_age: Duration::from_secs(86400 * 7),
        }
    }

    /// Add a subject to the stream
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subjects.push(subject.into());
        self
    }

    /// Set maximum bytes
    pub fn max_bytes(mut self, max: i64) -> Self {
        self.max_bytes = max;
        self
    }

    /// Set maximum age for records
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = duration;
        self
    }

    /// Build the stream configuration
    pub fn build(self) -> jetstream::stream::Config {
        jetstream::stream::Config {
            name: self.name,
            subjects: self.subjects,
            max_messages: self.max_messages,
            max_bytes: self.max_bytes,
            max_age: self.max_age,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::ERROR_FIELD;
    use futures::StreamExt;

    #[test]
    fn test_jetstream_name() {
        assert_eq!(jetstream_name("distribucion.bloques"), "DISTRIBUCION_BLOQUES");
        assert_eq!(
            jetstream_name("staging.distribucion.bloques.dlq"),
            "STAGING_DISTRIBUCION_BLOQUES_DLQ"
        );
        assert_eq!(jetstream_name("a:b-c"), "A_B-C");
    }

    #[test]
    fn test_header_value_single_line() {
        assert_eq!(header_value("line one\r\nline two"), "line one  line two");
    }

    #[test]
    fn test_stream_config_builder() {
        let config = StreamConfigBuilder::new("DISTRIBUCION_BLOQUES")
            .subject("distribucion.bloques")
            .max_bytes(500_000_000)
            .max_age(Duration::from_secs(3600))
            .build();

        assert_eq!(config.name, "DISTRIBUCION_BLOQUES");
        assert_eq!(config.subjects, vec!["distribucion.bloques".to_string()]);
        assert_eq!(config.max_messages, -1);
        assert_eq!(config.max_bytes, 500_000_000);
        assert_eq!(config.max_age, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_verify_on_boot_fails_fast_when_unreachable() {
        let config = PublisherConfig {
            url: "nats://127.0.0.1:1".to_string(),
            connect_timeout_ms: 500,
            ..PublisherConfig::default()
        };

        let result = JetStreamLog::connect(config).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_unverified_boot_defers_failure_to_first_append() {
        let config = PublisherConfig {
            url: "nats://127.0.0.1:1".to_string(),
            verify_on_boot: false,
            connect_timeout_ms: 200,
            io_timeout_ms: 200,
            ..PublisherConfig::default()
        };

        let log = JetStreamLog::connect(config).await.unwrap();
        assert_eq!(
            log.deferred_streams(),
            vec![
                "distribucion.bloques".to_string(),
                "distribucion.bloques.dlq".to_string()
            ]
        );

        let err = log
            .append("distribucion.bloques", &[(DATA_FIELD, "{}")])
            .await
            .unwrap_err();
        assert_eq!(err.stream, "distribucion.bloques");
        assert!(!err.message.is_empty());
        assert_eq!(log.deferred_streams().len(), 2);
    }

    #[tokio::test]
    async fn test_unverified_boot_without_stream_creation() {
        let config = PublisherConfig {
            url: "nats://127.0.0.1:1".to_string(),
            verify_on_boot: false,
            ensure_streams: false,
            ..PublisherConfig::default()
        };

        let log = JetStreamLog::connect(config).await.unwrap();
        assert!(log.deferred_streams().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_connecting() {
        let config = PublisherConfig {
            url: String::new(),
            ..PublisherConfig::default()
        };

        let result = JetStreamLog::connect(config).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    #[ignore = "requires NATS server"]
    async fn test_append_and_read_back() {
        let config = PublisherConfig {
            key_prefix: Some("test".to_string()),
            ..PublisherConfig::default()
        };
        let log = JetStreamLog::connect(config).await.unwrap();

        let id = log
            .append(
                "distribucion.bloques.dlq",
                &[(DATA_FIELD, r#"{"id":"1"}"#), (ERROR_FIELD, "broker down")],
            )
            .await
            .unwrap();
        assert!(id.0 > 0);

        let stream = log
            .context
            .get_stream(jetstream_name("test.distribucion.bloques.dlq"))
            .await
            .unwrap();
        let consumer = stream
            .create_consumer(jetstream::consumer::pull::Config {
                deliver_policy: jetstream::consumer::DeliverPolicy::ByStartSequence {
                    start_sequence: id.0,
                },
                ..Default::default()
            })
            .await
            .unwrap();
        let mut messages = consumer.messages().await.unwrap();

        let msg = messages.next().await.unwrap().unwrap();
        assert_eq!(msg.payload.as_ref(), br#"{"id":"1"}"#);
        let headers = msg.headers.as_ref().unwrap();
        assert_eq!(headers.get(ERROR_FIELD).unwrap().as_str(), "broker down");
        msg.ack().await.unwrap();
    }
}
