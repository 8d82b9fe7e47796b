use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of document being geo-tracked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackedKind {
    Worker,
    Assignment,
}

impl TrackedKind {
    pub fn all() -> &'static [TrackedKind] {
        &[TrackedKind::Worker, TrackedKind::Assignment]
    }

    /// Whether raw events for this kind pass through the time-window filter.
    pub fn is_windowed(&self) -> bool {
        matches!(self, TrackedKind::Assignment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedKind::Worker => "worker",
            TrackedKind::Assignment => "assignment",
        }
    }
}

impl fmt::Display for TrackedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
