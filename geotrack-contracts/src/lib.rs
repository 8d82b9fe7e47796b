//! Trait surfaces describing the collaborators the tracker consumes.
//!
//! The geo index itself (spatial storage, radius evaluation, change feeds)
//! lives outside this workspace; everything here is the seam a concrete
//! index client has to satisfy.

pub mod clock;
pub mod index;
pub mod tenant;

pub use clock::{Clock, FixedClock, SystemClock};
pub use index::{
    GeoEventSink, GeoIndex, GeoIndexError, GeoIndexEvent, GeoQueryRequest, GeoSubscription,
};
pub use tenant::{StaticTenant, TenantSource};

/// Frequently used contract imports.
pub mod prelude {
    pub use super::clock::Clock;
    pub use super::index::{GeoEventSink, GeoIndex, GeoIndexEvent, GeoSubscription};
    pub use super::tenant::TenantSource;
}
