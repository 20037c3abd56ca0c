//! CloudEvents 1.0 envelope
//!
//! A thin, immutable value type. The only behaviour is its wire form:
//! absent optional attributes are omitted, never written as `null`, and
//! empty `dataschema`/`subject` are omitted as well.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Serialize, Serializer};

use crate::error::Result;

pub const DEFAULT_SPEC_VERSION: &str = "1.0";
pub const DEFAULT_DATA_CONTENT_TYPE: &str = "application/json";

/// One CloudEvents-shaped event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudEvent {
    #[serde(rename = "specversion")]
    spec_version: String,

    #[serde(rename = "type")]
    event_type: String,

    source: String,

    id: String,

    #[serde(serialize_with = "serialize_time")]
    time: DateTime<FixedOffset>,

    #[serde(rename = "datacontenttype")]
    data_content_type: String,

    #[serde(rename = "dataschema", skip_serializing_if = "String::is_empty")]
    data_schema: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    subject: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    traceparent: Option<String>,

    data: serde_json::Value,
}

impl CloudEvent {
    /// Create an envelope with the required attributes
    ///
    /// `specversion` defaults to `1.0`, `datacontenttype` to
    /// `application/json` and `traceparent` is absent.
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        id: impl Into<String>,
        time: impl Into<DateTime<FixedOffset>>,
        data_schema: impl Into<String>,
        subject: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            spec_version: DEFAULT_SPEC_VERSION.to_string(),
            event_type: event_type.into(),
            source: source.into(),
            id: id.into(),
            time: time.into(),
            data_content_type: DEFAULT_DATA_CONTENT_TYPE.to_string(),
            data_schema: data_schema.into(),
            subject: subject.into(),
            traceparent: None,
            data,
        }
    }

    pub fn with_traceparent(mut self, traceparent: impl Into<String>) -> Self {
        self.traceparent = Some(traceparent.into());
        self
    }

    pub fn with_spec_version(mut self, spec_version: impl Into<String>) -> Self {
        self.spec_version = spec_version.into();
        self
    }

    pub fn with_data_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.data_content_type = content_type.into();
        self
    }

    pub fn spec_version(&self) -> &str {
        &self.spec_version
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn time(&self) -> DateTime<FixedOffset> {
        self.time
    }

    pub fn data_content_type(&self) -> &str {
        &self.data_content_type
    }

    pub fn data_schema(&self) -> &str {
        &self.data_schema
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn traceparent(&self) -> Option<&str> {
        self.traceparent.as_deref()
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Wire form as an ordered JSON object
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Wire form as a compact JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// RFC 3339 with whole seconds and a numeric offset, e.g. 2025-03-01T10:00:00+00:00
fn serialize_time<S>(time: &DateTime<FixedOffset>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> CloudEvent {
        CloudEvent::new(
            "logistrack.distribucion.BlockConsolidated.v1",
            "logistrack://distribucion",
            "0b7c5e0e-8f3a-4b8e-9d61-3f0a4c2e9b11",
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            "https://contracts.logistrack/schemas/BlockConsolidated/1.2/schema.json",
            "block:b-1001",
            json!({"block_id": "b-1001", "orders": []}),
        )
    }

    #[test]
    fn test_defaults() {
        let event = sample();
        assert_eq!(event.spec_version(), "1.0");
        assert_eq!(event.data_content_type(), "application/json");
        assert!(event.traceparent().is_none());
    }

    #[test]
    fn test_no_traceparent_key_when_absent() {
        let value = sample().to_value().unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("traceparent"));
        assert!(!sample().to_json().unwrap().contains("null"));
    }

    #[test]
    fn test_all_attributes_present_when_set() {
        let event = sample().with_traceparent(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        );
        let value = event.to_value().unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec![
                "specversion",
                "type",
                "source",
                "id",
                "time",
                "datacontenttype",
                "dataschema",
                "subject",
                "traceparent",
                "data",
            ]
        );
    }

    #[test]
    fn test_empty_schema_and_subject_omitted() {
        let event = CloudEvent::new(
            "t.v1",
            "test://src",
            "id-1",
            Utc::now(),
            "",
            "",
            json!({}),
        );
        let value = event.to_value().unwrap();
        assert!(value.get("dataschema").is_none());
        assert!(value.get("subject").is_none());
        assert_eq!(value["data"], json!({}));
    }

    #[test]
    fn test_time_format_keeps_offset() {
        let value = sample().to_value().unwrap();
        assert_eq!(value["time"], "2025-03-01T10:00:00+00:00");

        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
        let event = CloudEvent::new("t.v1", "s", "i", local, "", "", json!({}));
        assert_eq!(event.to_value().unwrap()["time"], "2025-03-01T07:00:00-03:00");
    }

    #[test]
    fn test_overrides() {
        let event = sample()
            .with_spec_version("1.1")
            .with_data_content_type("application/cloudevents+json");
        let value = event.to_value().unwrap();
        assert_eq!(value["specversion"], "1.1");
        assert_eq!(value["datacontenttype"], "application/cloudevents+json");
    }
}
