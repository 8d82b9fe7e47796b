//! Replay scenarios: a seed of documents plus a list of steps driven
//! against an in-memory index.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use geotrack_model::{GeoPoint, GeoRecord, QueryGeometry};

use crate::error::ScenarioError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub key: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub record: GeoRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    TrackWorkers {
        #[serde(default)]
        geometry: Option<QueryGeometry>,
        #[serde(default)]
        work_group: Option<String>,
    },
    TrackAssignments {
        #[serde(default)]
        geometry: Option<QueryGeometry>,
        #[serde(default)]
        status: Option<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    TrackWorkersAndAssignments {
        #[serde(default)]
        geometry: Option<QueryGeometry>,
        #[serde(default)]
        status: Option<String>,
        day: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Set(Document),
    Remove {
        collection: String,
        key: String,
    },
    StopWorkers,
    StopAssignments,
    /// Tear down every live query on a collection.
    Fail {
        collection: String,
        message: String,
        #[serde(default = "terminal_default")]
        terminal: bool,
    },
}

fn terminal_default() -> bool {
    true
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::TrackWorkers { .. } => "track_workers",
            Step::TrackAssignments { .. } => "track_assignments",
            Step::TrackWorkersAndAssignments { .. } => "track_workers_and_assignments",
            Step::Set(_) => "set",
            Step::Remove { .. } => "remove",
            Step::StopWorkers => "stop_workers",
            Step::StopAssignments => "stop_assignments",
            Step::Fail { .. } => "fail",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Overrides the configured tenant.
    pub tenant_id: Option<String>,
    /// Calendar day treated as today; the local date when absent.
    pub today: Option<NaiveDate>,
    pub documents: Vec<Document>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Document {
    pub fn new(collection: &str, key: &str, location: GeoPoint, record: GeoRecord) -> Self {
        Self {
            collection: collection.to_string(),
            key: key.to_string(),
            location,
            record,
        }
    }
}
