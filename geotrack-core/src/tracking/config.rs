use serde::{Deserialize, Serialize};

use geotrack_model::TrackedKind;

/// Knobs for the tracking multiplexer.
///
/// All fields carry defaults so partial configuration payloads are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Collection holding user documents; workers are the `worker_type` subset.
    pub workers_collection: String,
    /// Collection holding geo-indexed assignment documents.
    pub assignments_collection: String,
    /// Value of the `type` field identifying field workers.
    pub worker_type: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            workers_collection: "users".to_string(),
            assignments_collection: "assignments".to_string(),
            worker_type: "worker".to_string(),
        }
    }
}

impl TrackingConfig {
    pub fn collection(&self, kind: TrackedKind) -> &str {
        match kind {
            TrackedKind::Worker => &self.workers_collection,
            TrackedKind::Assignment => &self.assignments_collection,
        }
    }
}
