//! In-memory append-only log
//!
//! Keeps every stream in a map behind a mutex and can be told to reject
//! appends to a given stream, which is how the fallback paths are exercised
//! without a broker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::AppendError;
use crate::log::{RecordId, StreamLog, StreamRecord};

#[derive(Default)]
struct State {
    streams: HashMap<String, Vec<StreamRecord>>,
    failures: HashMap<String, String>,
}

/// Append-only log held in process memory
#[derive(Default)]
pub struct InMemoryLog {
    state: Mutex<State>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following append to `stream` with `message`
    ///
    /// # Arguments
    /// - `stream`: stream name as passed to [`StreamLog::append`]
    /// - `message`: text of the [`AppendError`] each rejected append returns
    ///
    /// Stays in force until [`InMemoryLog::recover_stream`].
    pub fn fail_stream(&self, stream: impl Into<String>, message: impl Into<String>) {
        self.lock().failures.insert(stream.into(), message.into());
    }

    /// Accept appends to `stream` again
    pub fn recover_stream(&self, stream: &str) {
        self.lock().failures.remove(stream);
    }

    /// Snapshot of the records appended to `stream`, oldest first
    pub fn records(&self, stream: &str) -> Vec<StreamRecord> {
        self.lock().streams.get(stream).cloned().unwrap_or_default()
    }

    pub fn len(&self, stream: &str) -> usize {
        self.lock().streams.get(stream).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every mutation is a single push or insert, so a poisoned guard still holds consistent state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StreamLog for InMemoryLog {
    async fn append(
        &self,
        stream: &str,
        fields: &[(&str, &str)],
    ) -> Result<RecordId, AppendError> {
        let mut state = self.lock();

        if let Some(message) = state.failures.get(stream) {
            return Err(AppendError::new(stream, message));
        }

        let records = state.streams.entry(stream.to_string()).or_default();
        let id = RecordId(records.len() as u64 + 1);
        records.push(StreamRecord {
            id,
            fields: fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        });

        tracing::debug!(stream = %stream, record_id = %id, "Record appended in memory");

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let log = InMemoryLog::new();
        let first = log.append("orders", &[("data", "1")]).await.unwrap();
        let second = log.append("orders", &[("data", "2")]).await.unwrap();
        let other = log.append("other", &[("data", "x")]).await.unwrap();

        assert!(second > first);
        assert_eq!(other, RecordId(1));
        assert_eq!(log.len("orders"), 2);
        assert_eq!(log.records("orders")[1].field("data"), Some("2"));
        assert!(log.is_empty("missing"));
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let log = InMemoryLog::new();
        log.fail_stream("orders", "connection reset");

        let err = log.append("orders", &[("data", "1")]).await.unwrap_err();
        assert_eq!(err.stream, "orders");
        assert_eq!(err.message, "connection reset");
        assert!(log.is_empty("orders"));

        log.recover_stream("orders");
        assert!(log.append("orders", &[("data", "1")]).await.is_ok());
        assert_eq!(log.len("orders"), 1);
    }
}
