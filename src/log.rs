//! Append-only log port
//!
//! The publisher writes through this trait so the backing store can be
//! JetStream in production and [`crate::InMemoryLog`] in tests.

use async_trait::async_trait;
use std::fmt;

use crate::error::AppendError;

/// Field carrying the serialized envelope
pub const DATA_FIELD: &str = "data";

/// Field carrying the primary failure text on dead-letter records
pub const ERROR_FIELD: &str = "error";

/// Broker-assigned position of a record within its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One appended record: ordered field/value pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: RecordId,
    pub fields: Vec<(String, String)>,
}

impl StreamRecord {
    /// Value of the first field with this name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Append-only log where the store assigns record ids
///
/// Implementations must be safe to share between tasks; the publisher
/// performs no locking of its own.
#[async_trait]
pub trait StreamLog: Send + Sync {
    /// Append one record to `stream`, returning the id the store assigned
    ///
    /// `fields` are written in order; the publisher sends [`DATA_FIELD`]
    /// and, on dead-letter records, [`ERROR_FIELD`].
    async fn append(
        &self,
        stream: &str,
        fields: &[(&str, &str)],
    ) -> Result<RecordId, AppendError>;
}
