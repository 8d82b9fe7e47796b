//! Core data model definitions shared across geotrack crates.
#![allow(missing_docs)]

pub mod error;
pub mod events;
pub mod filters;
pub mod geo;
pub mod ids;
pub mod kind;
pub mod record;
pub mod window;

pub use error::{ModelError, Result};
pub use events::{GeoEvent, GeoEventKind, GeoEventPayload, KeyUpdate};
pub use filters::{FieldFilter, FilterSet, FilterValue};
pub use geo::{EARTH_RADIUS_KM, GeoPoint, QueryGeometry};
pub use ids::TenantId;
pub use kind::TrackedKind;
pub use record::GeoRecord;
pub use window::TimeWindow;
