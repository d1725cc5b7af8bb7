//! REST API response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::transform::dsl::Record;

/// Response to a mapped event: the record as it would be handed to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    /// "mapped"
    pub status: String,

    pub event_id: String,

    /// Fully qualified schema name
    pub schema: String,

    /// Identifiers were generated by the collector
    pub unreliable: bool,

    /// Record fields in schema order
    pub record: Value,
}

impl EventResponse {
    pub fn new(event_id: &str, schema: &str, unreliable: bool, record: &Record) -> Self {
        Self {
            status: "mapped".to_string(),
            event_id: event_id.to_string(),
            schema: schema.to_string(),
            unreliable,
            record: record.to_json(),
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "record": null
    })
}
