//! Replay tooling for the geotrack multiplexer.
//!
//! `geotrackctl replay` seeds an in-memory geo index, runs a scripted list of
//! tracking calls and document writes against it, and prints the outward
//! event stream as JSON lines. `geotrackctl config` shows the configuration
//! the tool would use.

#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod replay;
pub mod scenario;

pub use config::{ConfigSource, CtlConfig};
pub use error::{ConfigLoadError, ScenarioError};
pub use replay::ReplaySummary;
pub use scenario::{Document, Scenario, Step};
