//! Event sink system for pipeline observability.
//!
//! The pipeline reports lifecycle events (run start and end, per-stage
//! outcomes, channel closing) to an [`EventSink`]. Sinks never fail the
//! pipeline: emission errors are the sink's own business.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the runtime.
pub mod types {
    /// A run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A run finished; carries the outcome.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A stage task started.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage task returned successfully.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage task returned an error.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A stage error arrived after the first one and was dropped.
    pub const STAGE_ERROR_DISCARDED: &str = "stage.error_discarded";
    /// A channel was closed during shutdown.
    pub const CHANNEL_CLOSED: &str = "channel.closed";
}

/// Builds an event payload with an RFC 3339 `timestamp` field added.
#[must_use]
pub fn payload(mut data: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(ref mut map) = data {
        map.insert(
            "timestamp".to_string(),
            serde_json::json!(chrono::Utc::now().to_rfc3339()),
        );
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_adds_timestamp() {
        let value = payload(serde_json::json!({"stage": "decorator#0"}));
        let ts = value["timestamp"].as_str().unwrap();

        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        assert_eq!(value["stage"], "decorator#0");
    }

    #[test]
    fn test_payload_leaves_non_objects_alone() {
        assert_eq!(payload(serde_json::json!(3)), serde_json::json!(3));
    }
}
