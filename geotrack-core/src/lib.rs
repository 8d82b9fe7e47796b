//! # geotrack core
//!
//! Live geospatial query multiplexer for dispatch tooling. A
//! [`GeoMultiplexer`](tracking::GeoMultiplexer) owns at most one radius
//! subscription per [`TrackedKind`](geotrack_model::TrackedKind) against an
//! external [`GeoIndex`](geotrack_contracts::GeoIndex), republishes the
//! index's ready/entered/exited/moved notifications on one shared
//! [`EventStream`](tracking::EventStream), and swaps subscriptions out when
//! their equality filters or time window change.
//!
//! ## Architecture
//!
//! - [`tracking::window`]: inclusive timestamp filter applied to assignments
//! - [`tracking::descriptor`]: value snapshot of a live query and the
//!   replace-vs-update decision
//! - [`tracking::session`]: one live subscription with epoch-gated forwarding
//! - [`tracking::multiplexer`]: public entry point
//! - [`infra::memory_index`]: in-process reference index
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geotrack_contracts::StaticTenant;
//! use geotrack_core::infra::memory_index::InMemoryGeoIndex;
//! use geotrack_core::tracking::{GeoMultiplexer, TrackingConfig};
//! use geotrack_model::{GeoPoint, QueryGeometry};
//!
//! # fn main() -> geotrack_core::Result<()> {
//! let index = Arc::new(InMemoryGeoIndex::new());
//! let tracker = GeoMultiplexer::new(
//!     index,
//!     Arc::new(StaticTenant::new("dealer-7")),
//!     TrackingConfig::default(),
//! );
//! let mut events = tracker.events().subscribe();
//!
//! let map = QueryGeometry::new(GeoPoint::new(59.33, 18.06), 5.0);
//! tracker.track_workers(Some(map), None)?;
//!
//! while let Some(event) = events.try_recv() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod error;
pub mod infra;
pub mod tracking;

pub use error::{Result, TrackingError};
