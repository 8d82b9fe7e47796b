//! Value snapshot of a live subscription and the rules for re-targeting it.

use serde::{Deserialize, Serialize};

use geotrack_model::{FilterSet, QueryGeometry, TimeWindow};

/// Parameters a subscription was opened (or last re-targeted) with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDescriptor {
    pub geometry: QueryGeometry,
    pub filters: FilterSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
}

/// What a session has to do to move from its current subscription to a
/// requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPlan {
    /// No subscription exists yet.
    Open,
    /// Filters or window differ; cancel and open a fresh subscription.
    Replace,
    /// Only the geometry differs; re-target the live subscription.
    UpdateCriteria,
    /// Identical parameters; nothing to do.
    Unchanged,
}

/// Equality filters and the time window decide which documents are eligible
/// at all, so the index cannot reconcile a change to them incrementally.
pub fn should_replace(current: &SubscriptionDescriptor, requested: &SubscriptionDescriptor) -> bool {
    current.filters != requested.filters || current.window != requested.window
}

pub fn plan(
    current: Option<&SubscriptionDescriptor>,
    requested: &SubscriptionDescriptor,
) -> SessionPlan {
    match current {
        None => SessionPlan::Open,
        Some(current) if should_replace(current, requested) => SessionPlan::Replace,
        Some(current) if current.geometry != requested.geometry => SessionPlan::UpdateCriteria,
        Some(_) => SessionPlan::Unchanged,
    }
}
