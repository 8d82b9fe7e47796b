//! One live index subscription per tracked kind.
//!
//! Every subscription a session opens is stamped with a fresh epoch. The sink
//! handed to the index captures that epoch and consults the shared
//! `EpochGate` before forwarding anything, so events that arrive after a
//! stop or a replacement are dropped no matter how late the index delivers
//! them. Forwarding happens while the gate is held, which serializes it
//! against epoch changes made from other threads.
//!
//! Per kind, events reach the outward stream in the order the index emits
//! them, `Ready` included: an index that reports its initial members before
//! `Ready` has them forwarded before `Ready`.
//!
//! Lock order: session slot, then index internals, then gate. The gate never
//! acquires anything else.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use geotrack_contracts::{
    GeoEventSink, GeoIndex, GeoIndexEvent, GeoQueryRequest, GeoSubscription,
};
use geotrack_model::{
    FilterSet, GeoEvent, GeoEventPayload, QueryGeometry, TimeWindow, TrackedKind,
};

use crate::error::{Result, TrackingError};
use crate::tracking::bus::EventStream;
use crate::tracking::descriptor::{SessionPlan, SubscriptionDescriptor, plan};
use crate::tracking::window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

/// Outcome of a successful [`QuerySession::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Opened,
    Replaced,
    UpdatedInPlace,
    Unchanged,
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub opened: u64,
    pub replaced: u64,
    pub updated_in_place: u64,
    pub cancelled: u64,
    pub stale_dropped: u64,
    pub window_filtered: u64,
    pub forwarded: u64,
}

#[derive(Debug, Default)]
struct SessionCounters {
    opened: AtomicU64,
    replaced: AtomicU64,
    updated_in_place: AtomicU64,
    cancelled: AtomicU64,
    stale_dropped: AtomicU64,
    window_filtered: AtomicU64,
    forwarded: AtomicU64,
}

impl SessionCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            opened: self.opened.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            updated_in_place: self.updated_in_place.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
            window_filtered: self.window_filtered.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
        }
    }
}

/// Epochs whose events may currently reach the outward stream.
///
/// `opening` is only set while `GeoIndex::open` runs, so initial events the
/// index emits synchronously are not lost while the previous subscription
/// stays untouched until the open succeeds.
#[derive(Debug, Default)]
struct EpochGate {
    live: Option<u64>,
    opening: Option<u64>,
}

impl EpochGate {
    fn admits(&self, epoch: u64) -> bool {
        self.live == Some(epoch) || self.opening == Some(epoch)
    }

    /// The index tore the subscription down on its own.
    fn close(&mut self, epoch: u64) {
        if self.live == Some(epoch) {
            self.live = None;
        }
        if self.opening == Some(epoch) {
            self.opening = None;
        }
    }
}

struct ActiveSubscription {
    epoch: u64,
    descriptor: SubscriptionDescriptor,
    handle: Box<dyn GeoSubscription>,
}

#[derive(Default)]
struct SessionSlot {
    next_epoch: u64,
    active: Option<ActiveSubscription>,
}

/// Owns the lifecycle of one live subscription for one [`TrackedKind`].
pub struct QuerySession {
    kind: TrackedKind,
    collection: String,
    index: Arc<dyn GeoIndex>,
    events: EventStream,
    gate: Arc<Mutex<EpochGate>>,
    counters: Arc<SessionCounters>,
    slot: Mutex<SessionSlot>,
}

impl fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("QuerySession");
        debug
            .field("kind", &self.kind)
            .field("collection", &self.collection);

        match self.slot.try_lock() {
            Some(slot) => {
                let epoch = slot.active.as_ref().map(|active| active.epoch);
                debug
                    .field("state", &self.state_of(&slot))
                    .field("epoch", &epoch);
            }
            None => {
                debug.field("state", &"<locked>");
            }
        }

        debug.finish()
    }
}

impl QuerySession {
    pub fn new(
        kind: TrackedKind,
        collection: impl Into<String>,
        index: Arc<dyn GeoIndex>,
        events: EventStream,
    ) -> Self {
        Self {
            kind,
            collection: collection.into(),
            index,
            events,
            gate: Arc::new(Mutex::new(EpochGate::default())),
            counters: Arc::new(SessionCounters::default()),
            slot: Mutex::new(SessionSlot::default()),
        }
    }

    pub fn kind(&self) -> TrackedKind {
        self.kind
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn state(&self) -> SessionState {
        let slot = self.slot.lock();
        self.state_of(&slot)
    }

    fn state_of(&self, slot: &SessionSlot) -> SessionState {
        match slot.active.as_ref() {
            Some(active) if self.gate.lock().live == Some(active.epoch) => SessionState::Active,
            _ => SessionState::Idle,
        }
    }

    /// Parameters of the live subscription, if any.
    pub fn descriptor(&self) -> Option<SubscriptionDescriptor> {
        let mut slot = self.slot.lock();
        self.reap_torn_down(&mut slot);
        slot.active.as_ref().map(|active| active.descriptor.clone())
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    /// Opens a subscription when the session is idle. An already active
    /// session is left as it is; use [`QuerySession::update`] to re-target.
    pub fn start(
        &self,
        geometry: QueryGeometry,
        filters: FilterSet,
        window: Option<TimeWindow>,
    ) -> Result<SessionTransition> {
        let mut slot = self.slot.lock();
        self.reap_torn_down(&mut slot);
        if slot.active.is_some() {
            debug!(entity = %self.kind, "start ignored, subscription already live");
            return Ok(SessionTransition::Unchanged);
        }

        let requested = Self::validated(geometry, filters, window)?;
        self.open_into(&mut slot, requested)?;
        Ok(SessionTransition::Opened)
    }

    /// Applies new parameters, replacing the subscription when filters or
    /// window changed and re-targeting it in place when only geometry did.
    ///
    /// `geometry: None` keeps the geometry of the live subscription. On error
    /// the previous subscription is left exactly as it was.
    pub fn update(
        &self,
        geometry: Option<QueryGeometry>,
        filters: FilterSet,
        window: Option<TimeWindow>,
    ) -> Result<SessionTransition> {
        let mut slot = self.slot.lock();
        self.reap_torn_down(&mut slot);

        let Some(geometry) = geometry
            .or_else(|| slot.active.as_ref().map(|active| active.descriptor.geometry))
        else {
            return Err(TrackingError::MissingGeometry(self.kind));
        };
        let requested = Self::validated(geometry, filters, window)?;

        let current = slot.active.as_ref().map(|active| &active.descriptor);
        match plan(current, &requested) {
            SessionPlan::Unchanged => {
                trace!(entity = %self.kind, "parameters unchanged");
                Ok(SessionTransition::Unchanged)
            }
            SessionPlan::UpdateCriteria => {
                let Some(active) = slot.active.as_mut() else {
                    return Err(TrackingError::MissingGeometry(self.kind));
                };
                active
                    .handle
                    .update_criteria(&requested.geometry, &requested.filters)?;
                debug!(
                    entity = %self.kind,
                    epoch = active.epoch,
                    lat = requested.geometry.center.lat,
                    lng = requested.geometry.center.lng,
                    radius_km = requested.geometry.radius_km,
                    "subscription re-targeted in place"
                );
                active.descriptor = requested;
                SessionCounters::bump(&self.counters.updated_in_place);
                Ok(SessionTransition::UpdatedInPlace)
            }
            SessionPlan::Open => {
                self.open_into(&mut slot, requested)?;
                Ok(SessionTransition::Opened)
            }
            SessionPlan::Replace => {
                self.open_into(&mut slot, requested)?;
                SessionCounters::bump(&self.counters.replaced);
                Ok(SessionTransition::Replaced)
            }
        }
    }

    /// Cancels the live subscription. Idempotent.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        let Some(mut active) = slot.active.take() else {
            return;
        };

        // Invalidate first so nothing from this epoch is forwarded once the
        // cancel call is in flight.
        self.gate.lock().close(active.epoch);
        active.handle.cancel();
        SessionCounters::bump(&self.counters.cancelled);
        info!(
            entity = %self.kind,
            epoch = active.epoch,
            collection = %self.collection,
            "subscription stopped"
        );
    }

    fn validated(
        geometry: QueryGeometry,
        filters: FilterSet,
        window: Option<TimeWindow>,
    ) -> Result<SubscriptionDescriptor> {
        geometry.validate()?;
        if let Some(window) = &window {
            window.validate()?;
        }
        Ok(SubscriptionDescriptor {
            geometry,
            filters,
            window,
        })
    }

    /// Opens a subscription for `requested` and, on success, swaps it in for
    /// the current one, cancelling the latter.
    fn open_into(&self, slot: &mut SessionSlot, requested: SubscriptionDescriptor) -> Result<()> {
        let epoch = slot.next_epoch;
        slot.next_epoch += 1;

        self.gate.lock().opening = Some(epoch);

        let sink = self.sink_for(epoch, requested.window);
        let request = GeoQueryRequest {
            collection: self.collection.clone(),
            geometry: requested.geometry,
            filters: requested.filters.clone(),
        };

        let handle = match self.index.open(request, sink) {
            Ok(handle) => handle,
            Err(err) => {
                self.gate.lock().opening = None;
                warn!(
                    entity = %self.kind,
                    collection = %self.collection,
                    error = %err,
                    "failed to open geo subscription"
                );
                return Err(err.into());
            }
        };

        {
            let mut gate = self.gate.lock();
            // A terminal error during open already cleared `opening`.
            gate.live = gate.opening.take().filter(|opened| *opened == epoch);
        }

        let previous = slot.active.replace(ActiveSubscription {
            epoch,
            descriptor: requested,
            handle,
        });
        SessionCounters::bump(&self.counters.opened);

        if let Some(mut previous) = previous {
            previous.handle.cancel();
            SessionCounters::bump(&self.counters.cancelled);
            info!(
                entity = %self.kind,
                old_epoch = previous.epoch,
                epoch,
                "subscription replaced"
            );
        } else {
            debug!(
                entity = %self.kind,
                epoch,
                collection = %self.collection,
                "subscription opened"
            );
        }

        Ok(())
    }

    /// Drops a subscription the index tore down on its own.
    fn reap_torn_down(&self, slot: &mut SessionSlot) {
        let torn_down = match slot.active.as_ref() {
            Some(active) => self.gate.lock().live != Some(active.epoch),
            None => false,
        };
        if torn_down && let Some(mut active) = slot.active.take() {
            active.handle.cancel();
            debug!(
                entity = %self.kind,
                epoch = active.epoch,
                "released subscription closed by the index"
            );
        }
    }

    fn sink_for(&self, epoch: u64, window: Option<TimeWindow>) -> GeoEventSink {
        let kind = self.kind;
        let gate = Arc::clone(&self.gate);
        let counters = Arc::clone(&self.counters);
        let events = self.events.clone();
        let ready_sent = AtomicBool::new(false);

        GeoEventSink::new(move |event| {
            let mut gate = gate.lock();
            if !gate.admits(epoch) {
                SessionCounters::bump(&counters.stale_dropped);
                trace!(entity = %kind, epoch, "dropped event from stale subscription");
                return;
            }

            let payload = match event {
                GeoIndexEvent::Ready => {
                    if ready_sent.swap(true, Ordering::Relaxed) {
                        return;
                    }
                    GeoEventPayload::Ready
                }
                GeoIndexEvent::KeyEntered(update)
                | GeoIndexEvent::KeyExited(update)
                | GeoIndexEvent::KeyMoved(update)
                    if !window::admits(kind, window.as_ref(), &update) =>
                {
                    SessionCounters::bump(&counters.window_filtered);
                    return;
                }
                GeoIndexEvent::KeyEntered(update) => GeoEventPayload::Entered(update),
                GeoIndexEvent::KeyExited(update) => GeoEventPayload::Exited(update),
                GeoIndexEvent::KeyMoved(update) => GeoEventPayload::Moved(update),
                GeoIndexEvent::Error { message, terminal } => {
                    if terminal {
                        gate.close(epoch);
                        warn!(entity = %kind, epoch, %message, "geo subscription closed by index");
                    } else {
                        warn!(entity = %kind, epoch, %message, "geo subscription reported an error");
                    }
                    GeoEventPayload::Error { message }
                }
            };

            events.publish(GeoEvent::new(kind, payload));
            SessionCounters::bump(&counters.forwarded);
        })
    }
}

impl Drop for QuerySession {
    fn drop(&mut self) {
        self.stop();
    }
}
