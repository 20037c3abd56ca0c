//! Per-call publish options

use serde::{Deserialize, Serialize};

/// Advisory hints attached to a single publish call
///
/// Neither field changes where or how long an event is stored: the stream
/// publisher records them in its debug log and otherwise ignores them.
/// Unknown keys are rejected when options are read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishOptions {
    /// Routing hint for log stores that co-locate related records
    #[serde(default, rename = "partitionKey", skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,

    /// Retention hint in seconds
    #[serde(default, rename = "ttlSeconds", skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    pub fn with_ttl_seconds(mut self, ttl: u64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let options = PublishOptions::new()
            .with_partition_key("block:b-1001")
            .with_ttl_seconds(3600);
        assert_eq!(options.partition_key.as_deref(), Some("block:b-1001"));
        assert_eq!(options.ttl_seconds, Some(3600));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: PublishOptions =
            serde_json::from_value(json!({"partitionKey": "block:b-1"})).unwrap();
        assert_eq!(options.partition_key.as_deref(), Some("block:b-1"));
        assert_eq!(options.ttl_seconds, None);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = serde_json::from_value::<PublishOptions>(json!({"priority": 5}));
        assert!(result.is_err());
    }
}
