//! Event publisher port and its stream-log implementation
//!
//! [`StreamPublisher`] appends each envelope to its target stream and, when
//! that append fails, redirects it to the dead-letter stream annotated with
//! the failure. Only a failure of both writes is reported as an error.

use async_trait::async_trait;

use crate::envelope::CloudEvent;
use crate::error::{AppendError, Error, Result};
use crate::log::{RecordId, StreamLog, DATA_FIELD, ERROR_FIELD};
use crate::options::PublishOptions;
use crate::PublisherConfig;

/// Where a published event ended up
///
/// A dead-lettered delivery is still a success for the caller: the event
/// is durable, just not where it was asked to go. `cause` holds the primary
/// failure so callers can report degraded publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Appended to the requested stream
    Primary { stream: String, record: RecordId },

    /// Primary append failed; the event sits in the dead-letter stream
    DeadLettered {
        stream: String,
        record: RecordId,
        cause: AppendError,
    },
}

impl Delivery {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Delivery::DeadLettered { .. })
    }

    pub fn stream(&self) -> &str {
        match self {
            Delivery::Primary { stream, .. } | Delivery::DeadLettered { stream, .. } => stream,
        }
    }

    pub fn record(&self) -> RecordId {
        match self {
            Delivery::Primary { record, .. } | Delivery::DeadLettered { record, .. } => *record,
        }
    }
}

/// Publishes envelopes to named channels
///
/// Returning `Ok` means the event was durably appended to either the
/// requested channel or a dead-letter channel. An empty `channel` selects
/// the implementation's default.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one envelope
    ///
    /// # Arguments
    /// - `channel`: target stream, or `""` for the default stream
    /// - `event`: envelope to append; it is serialized once per call
    /// - `options`: advisory hints, see [`PublishOptions`]
    ///
    /// # Errors
    /// - [`Error::Serialization`] if the envelope cannot be encoded
    /// - [`Error::Publish`] if the event could not be stored anywhere
    async fn publish(
        &self,
        channel: &str,
        event: &CloudEvent,
        options: Option<&PublishOptions>,
    ) -> Result<Delivery>;

    /// Publish events one after another, stopping at the first error
    async fn publish_all(
        &self,
        channel: &str,
        events: &[CloudEvent],
        options: Option<&PublishOptions>,
    ) -> Result<Vec<Delivery>> {
        let mut deliveries = Vec::with_capacity(events.len());

        for event in events {
            deliveries.push(self.publish(channel, event, options).await?);
        }

        Ok(deliveries)
    }
}

/// Stream names used by [`StreamPublisher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRoutes {
    pub default_stream: String,
    pub dead_letter_stream: String,
}

impl StreamRoutes {
    pub fn new(default_stream: impl Into<String>, dead_letter_stream: impl Into<String>) -> Self {
        Self {
            default_stream: default_stream.into(),
            dead_letter_stream: dead_letter_stream.into(),
        }
    }
}

impl From<&PublisherConfig> for StreamRoutes {
    fn from(config: &PublisherConfig) -> Self {
        Self::new(&config.default_stream, &config.dead_letter_stream)
    }
}

/// [`EventPublisher`] over an append-only [`StreamLog`] with dead-letter fallback
pub struct StreamPublisher<L> {
    log: L,
    routes: StreamRoutes,
}

impl<L: StreamLog> StreamPublisher<L> {
    /// Create a stream publisher
    ///
    /// # Arguments
    /// - `log`: append-only log, shared by every publish call
    /// - `routes`: default and dead-letter stream names, usually
    ///   `StreamRoutes::from(&config)`
    pub fn new(log: L, routes: impl Into<StreamRoutes>) -> Self {
        Self {
            log,
            routes: routes.into(),
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn routes(&self) -> &StreamRoutes {
        &self.routes
    }

    fn target_stream<'a>(&'a self, channel: &'a str) -> &'a str {
        if channel.is_empty() {
            &self.routes.default_stream
        } else {
            channel
        }
    }

    async fn dead_letter(
        &self,
        stream: &str,
        event: &CloudEvent,
        payload: &str,
        cause: AppendError,
    ) -> Result<Delivery> {
        let dlq = &self.routes.dead_letter_stream;
        let fields = [(DATA_FIELD, payload), (ERROR_FIELD, cause.message.as_str())];

        match self.log.append(dlq, &fields).await {
            Ok(record) => {
                tracing::error!(
                    stream = %stream,
                    dlq = %dlq,
                    event_type = %event.event_type(),
                    subject = %event.subject(),
                    event_id = %event.id(),
                    record_id = %record,
                    error = %cause.message,
                    "Primary append failed; event redirected to dead-letter stream"
                );

                Ok(Delivery::DeadLettered {
                    stream: dlq.clone(),
                    record,
                    cause,
                })
            }
            Err(dead_letter) => {
                tracing::error!(
                    severity = "critical",
                    stream = %stream,
                    dlq = %dlq,
                    event_type = %event.event_type(),
                    subject = %event.subject(),
                    event_id = %event.id(),
                    error = %cause.message,
                    dlq_error = %dead_letter.message,
                    "Dead-letter append failed too; event lost"
                );

                Err(Error::Publish {
                    primary: cause,
                    dead_letter,
                })
            }
        }
    }
}

#[async_trait]
impl<L: StreamLog> EventPublisher for StreamPublisher<L> {
    /// Append to the target stream, falling back to the dead-letter stream
    ///
    /// # Test Reference
    /// - Test: `tests/integration_tests.rs::test_healthy_store_appends_once_to_default_stream`
    /// - Test: `tests/integration_tests.rs::test_primary_failure_redirects_to_dead_letter`
    /// - Test: `tests/integration_tests.rs::test_both_failures_raise_primary_error`
    async fn publish(
        &self,
        channel: &str,
        event: &CloudEvent,
        options: Option<&PublishOptions>,
    ) -> Result<Delivery> {
        let stream = self.target_stream(channel);

        // No fallback when the payload itself cannot be formed.
        let payload = event.to_json()?;

        if let Some(options) = options {
            tracing::debug!(
                stream = %stream,
                event_id = %event.id(),
                partition_key = ?options.partition_key,
                ttl_seconds = ?options.ttl_seconds,
                "Publish options are advisory and not applied"
            );
        }

        match self.log.append(stream, &[(DATA_FIELD, payload.as_str())]).await {
            Ok(record) => {
                tracing::info!(
                    stream = %stream,
                    event_type = %event.event_type(),
                    subject = %event.subject(),
                    event_id = %event.id(),
                    record_id = %record,
                    "Event published"
                );

                Ok(Delivery::Primary {
                    stream: stream.to_string(),
                    record,
                })
            }
            Err(cause) => self.dead_letter(stream, event, &payload, cause).await,
        }
    }
}
