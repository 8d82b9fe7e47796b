use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::kind::TrackedKind;
use crate::record::GeoRecord;

/// Key-level change reported by the geo index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyUpdate {
    pub key: String,
    pub location: GeoPoint,
    /// Distance from the query center at the time of the event.
    pub distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<GeoRecord>,
}

/// Discriminant of a [`GeoEventPayload`], handy for assertions and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoEventKind {
    Ready,
    Entered,
    Exited,
    Moved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GeoEventPayload {
    /// Initial synchronisation of a subscription finished.
    Ready,
    Entered(KeyUpdate),
    Exited(KeyUpdate),
    Moved(KeyUpdate),
    /// Asynchronous transport failure reported after the subscription opened.
    Error { message: String },
}

/// Event published on the shared outward stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoEvent {
    pub entity: TrackedKind,
    #[serde(flatten)]
    pub payload: GeoEventPayload,
}

impl GeoEvent {
    pub fn new(entity: TrackedKind, payload: GeoEventPayload) -> Self {
        Self { entity, payload }
    }

    pub fn kind(&self) -> GeoEventKind {
        match self.payload {
            GeoEventPayload::Ready => GeoEventKind::Ready,
            GeoEventPayload::Entered(_) => GeoEventKind::Entered,
            GeoEventPayload::Exited(_) => GeoEventKind::Exited,
            GeoEventPayload::Moved(_) => GeoEventKind::Moved,
            GeoEventPayload::Error { .. } => GeoEventKind::Error,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.update().map(|update| update.key.as_str())
    }

    pub fn update(&self) -> Option<&KeyUpdate> {
        match &self.payload {
            GeoEventPayload::Entered(update)
            | GeoEventPayload::Exited(update)
            | GeoEventPayload::Moved(update) => Some(update),
            GeoEventPayload::Ready | GeoEventPayload::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, GeoEventPayload::Error { .. })
    }
}
