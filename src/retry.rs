//! Caller-side retry for lost events
//!
//! The stream publisher never retries. This decorator re-sends the same
//! envelope (same `id`) when a publish ends in event loss, backing off
//! exponentially between attempts: `base_delay`, `2 * base_delay`,
//! `4 * base_delay`, ...

use async_trait::async_trait;
use std::time::Duration;

use crate::envelope::CloudEvent;
use crate::error::Result;
use crate::options::PublishOptions;
use crate::publisher::{Delivery, EventPublisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1 (a single try, no retry)
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before attempt `attempt + 1`, given `attempt` already failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }
}

/// Wraps a publisher and retries publishes that lost the event
pub struct RetryingPublisher<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: EventPublisher> RetryingPublisher<P> {
    /// Wrap `inner` with `policy`
    ///
    /// Only [`crate::Error::Publish`] is retried; a dead-lettered delivery
    /// counts as success and other errors are returned at once. Every
    /// attempt re-sends the same envelope, so its `id` is stable.
    ///
    /// # Test Reference
    /// - Test: `src/retry.rs::tests::test_retries_until_success`
    /// - Test: `src/retry.rs::tests::test_serialization_error_not_retried`
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EventPublisher> EventPublisher for RetryingPublisher<P> {
    async fn publish(
        &self,
        channel: &str,
        event: &CloudEvent,
        options: Option<&PublishOptions>,
    ) -> Result<Delivery> {
        let mut attempt = 1;

        loop {
            match self.inner.publish(channel, event, options).await {
                Err(e) if e.is_event_loss() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        event_id = %event.id(),
                        subject = %event.subject(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish lost the event, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
