//! Live radius tracking of workers and assignments.

pub mod bus;
pub mod config;
pub mod descriptor;
pub mod multiplexer;
pub mod session;
pub mod window;

pub use bus::{EventStream, GeoEventReceiver};
pub use config::TrackingConfig;
pub use descriptor::{SessionPlan, SubscriptionDescriptor, plan, should_replace};
pub use multiplexer::GeoMultiplexer;
pub use session::{QuerySession, SessionState, SessionStats, SessionTransition};
