use std::fmt;
use std::sync::Arc;

use geotrack_model::{FilterSet, KeyUpdate, QueryGeometry};
use thiserror::Error;

/// Failures reported by a geo index while opening or re-targeting a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoIndexError {
    #[error("invalid query geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid query filter: {0}")]
    InvalidFilter(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("subscription is no longer live")]
    Closed,

    #[error("geo index unavailable: {0}")]
    Unavailable(String),
}

/// Raw notification emitted by a live index subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoIndexEvent {
    Ready,
    KeyEntered(KeyUpdate),
    KeyExited(KeyUpdate),
    KeyMoved(KeyUpdate),
    /// Transport failure. `terminal` is set when the index tore the
    /// subscription down and will not emit anything further for it.
    Error { message: String, terminal: bool },
}

/// Parameters for opening a radius query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoQueryRequest {
    pub collection: String,
    pub geometry: QueryGeometry,
    pub filters: FilterSet,
}

/// Typed callback through which an index delivers [`GeoIndexEvent`]s.
///
/// Sinks are cheap to clone and may be invoked from any thread, including
/// synchronously from inside [`GeoIndex::open`].
#[derive(Clone)]
pub struct GeoEventSink {
    inner: Arc<dyn Fn(GeoIndexEvent) + Send + Sync>,
}

impl GeoEventSink {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(GeoIndexEvent) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    pub fn emit(&self, event: GeoIndexEvent) {
        (self.inner)(event);
    }
}

impl fmt::Debug for GeoEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoEventSink")
            .field("handlers", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// Client of an external spatial index supporting live radius queries.
pub trait GeoIndex: Send + Sync {
    /// Open a live query. Fails synchronously for malformed requests; no
    /// events may be emitted through `sink` when an error is returned.
    fn open(
        &self,
        request: GeoQueryRequest,
        sink: GeoEventSink,
    ) -> Result<Box<dyn GeoSubscription>, GeoIndexError>;
}

/// Handle to one live radius query.
pub trait GeoSubscription: Send {
    /// Re-target the query in place. The index reconciles membership and
    /// keeps emitting through the sink registered at `open`.
    fn update_criteria(
        &mut self,
        geometry: &QueryGeometry,
        filters: &FilterSet,
    ) -> Result<(), GeoIndexError>;

    /// Release the query. Must be idempotent.
    fn cancel(&mut self);
}
