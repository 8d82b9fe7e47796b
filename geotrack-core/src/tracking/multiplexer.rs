//! Public entry point: one query session per tracked kind, one outward stream.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use geotrack_contracts::{Clock, GeoIndex, SystemClock, TenantSource};
use geotrack_model::filters::{STATUS_FIELD, TENANT_FIELD, TYPE_FIELD, WORK_GROUP_FIELD};
use geotrack_model::{FieldFilter, FilterSet, QueryGeometry, TimeWindow, TrackedKind};

use crate::error::{Result, TrackingError};
use crate::tracking::bus::EventStream;
use crate::tracking::config::TrackingConfig;
use crate::tracking::session::QuerySession;

/// Tracks workers and assignments inside a map radius and multiplexes their
/// live events onto a single [`EventStream`].
///
/// Dropping the multiplexer cancels every live subscription.
pub struct GeoMultiplexer {
    config: TrackingConfig,
    tenant: Arc<dyn TenantSource>,
    clock: Arc<dyn Clock>,
    events: EventStream,
    workers: QuerySession,
    assignments: QuerySession,
}

impl fmt::Debug for GeoMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoMultiplexer")
            .field("config", &self.config)
            .field("events", &self.events)
            .field("workers", &self.workers)
            .field("assignments", &self.assignments)
            .finish()
    }
}

impl GeoMultiplexer {
    pub fn new(
        index: Arc<dyn GeoIndex>,
        tenant: Arc<dyn TenantSource>,
        config: TrackingConfig,
    ) -> Self {
        let events = EventStream::new();
        let workers = QuerySession::new(
            TrackedKind::Worker,
            config.collection(TrackedKind::Worker),
            Arc::clone(&index),
            events.clone(),
        );
        let assignments = QuerySession::new(
            TrackedKind::Assignment,
            config.collection(TrackedKind::Assignment),
            index,
            events.clone(),
        );

        Self {
            config,
            tenant,
            clock: Arc::new(SystemClock),
            events,
            workers,
            assignments,
        }
    }

    /// Replace the calendar used to decide whether a requested day is today.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// The shared outward stream; the same handle every `track_*` returns.
    pub fn events(&self) -> EventStream {
        self.events.clone()
    }

    pub fn session(&self, kind: TrackedKind) -> &QuerySession {
        match kind {
            TrackedKind::Worker => &self.workers,
            TrackedKind::Assignment => &self.assignments,
        }
    }

    /// Track field workers around `geometry`, optionally restricted to one
    /// work group. `geometry: None` keeps the current map area.
    pub fn track_workers(
        &self,
        geometry: Option<QueryGeometry>,
        work_group: Option<&str>,
    ) -> Result<EventStream> {
        let filters = self.worker_filters(work_group)?;
        let transition = self.workers.update(geometry, filters, None)?;
        debug!(?transition, ?work_group, "worker tracking applied");
        Ok(self.events())
    }

    /// Track assignments around `geometry` whose timestamp lies within
    /// `[start, end]`, optionally restricted to one status.
    pub fn track_assignments(
        &self,
        geometry: Option<QueryGeometry>,
        status: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EventStream> {
        let filters = self.assignment_filters(status)?;
        let window = TimeWindow::new(start, end)?;
        let transition = self.assignments.update(geometry, filters, Some(window))?;
        debug!(?transition, ?status, "assignment tracking applied");
        Ok(self.events())
    }

    /// Assignments are always tracked. Workers are tracked only when `day`
    /// is today; for any other day their current position is meaningless, so
    /// worker tracking is stopped instead.
    ///
    /// The day alone gates workers, even when `[start, end]` overlaps today.
    ///
    /// When workers are to be tracked but neither `geometry` nor a live worker
    /// subscription supplies an area, the call fails with `MissingGeometry`
    /// before assignments are touched.
    pub fn track_workers_and_assignments(
        &self,
        geometry: Option<QueryGeometry>,
        status: Option<&str>,
        day: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EventStream> {
        let workers_today = day == self.clock.today();
        if workers_today && geometry.is_none() && self.workers.descriptor().is_none() {
            return Err(TrackingError::MissingGeometry(TrackedKind::Worker));
        }

        self.track_assignments(geometry, status, start, end)?;

        if workers_today {
            self.track_workers(geometry, None)
        } else {
            if self.workers.descriptor().is_some() {
                info!(%day, "requested day is not today, stopping worker tracking");
            }
            self.workers.stop();
            Ok(self.events())
        }
    }

    pub fn stop_workers(&self) {
        self.workers.stop();
    }

    pub fn stop_assignments(&self) {
        self.assignments.stop();
    }

    /// Cancel every live subscription. The stream stays usable for later
    /// `track_*` calls.
    pub fn shutdown(&self) {
        self.workers.stop();
        self.assignments.stop();
    }

    /// `{dealerId, type = worker, workGroup?}`
    pub fn worker_filters(&self, work_group: Option<&str>) -> Result<FilterSet> {
        let mut filters = self.tenant_filters()?;
        filters.push(FieldFilter::equals(
            TYPE_FIELD,
            self.config.worker_type.as_str(),
        ));
        if let Some(group) = work_group {
            filters.push(FieldFilter::equals(WORK_GROUP_FIELD, group));
        }
        Ok(filters)
    }

    /// `{dealerId, status?}`
    pub fn assignment_filters(&self, status: Option<&str>) -> Result<FilterSet> {
        let mut filters = self.tenant_filters()?;
        if let Some(status) = status.filter(|status| !status.is_empty()) {
            filters.push(FieldFilter::equals(STATUS_FIELD, status));
        }
        Ok(filters)
    }

    fn tenant_filters(&self) -> Result<FilterSet> {
        let tenant = self.tenant.tenant_id().ok_or(TrackingError::MissingTenant)?;
        Ok(FilterSet::new().with(FieldFilter::equals(TENANT_FIELD, tenant.0)))
    }
}

impl Drop for GeoMultiplexer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
