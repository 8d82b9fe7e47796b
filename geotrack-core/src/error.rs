use geotrack_contracts::GeoIndexError;
use geotrack_model::{ModelError, TrackedKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("No geometry supplied and no active {0} subscription to reuse")]
    MissingGeometry(TrackedKind),

    #[error("No active dealer configured")]
    MissingTenant,

    #[error("Geo index rejected the query: {0}")]
    Index(#[from] GeoIndexError),
}

impl From<ModelError> for TrackingError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidGeometry(msg) => TrackingError::InvalidGeometry(msg),
            ModelError::InvalidWindow(msg) => TrackingError::InvalidWindow(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;
