#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use geotrack_contracts::{
    FixedClock, GeoEventSink, GeoIndex, GeoIndexError, GeoIndexEvent, GeoQueryRequest,
    GeoSubscription, StaticTenant,
};
use geotrack_core::tracking::{GeoMultiplexer, TrackingConfig};
use geotrack_model::record::TIMESTAMP_FIELD;
use geotrack_model::{FilterSet, GeoPoint, GeoRecord, KeyUpdate, QueryGeometry};

pub const DEALER: &str = "dealer-7";

/// Everything the fake index observed, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall {
    Open {
        id: usize,
        collection: String,
        geometry: QueryGeometry,
        filters: FilterSet,
    },
    Update {
        id: usize,
        geometry: QueryGeometry,
        filters: FilterSet,
    },
    Cancel {
        id: usize,
    },
}

#[derive(Default)]
struct RecorderState {
    calls: Vec<IndexCall>,
    sinks: Vec<GeoEventSink>,
    cancelled: Vec<bool>,
    fail_next_open: Option<GeoIndexError>,
    fail_next_update: Option<GeoIndexError>,
    emit_on_open: Vec<GeoIndexEvent>,
}

/// Geo index fake that records every call and lets tests push events
/// through any sink it was ever handed, including cancelled ones.
#[derive(Clone, Default)]
pub struct RecordingIndex {
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.state.lock().calls.clone()
    }

    pub fn opens(&self) -> Vec<IndexCall> {
        self.calls_matching(|call| matches!(call, IndexCall::Open { .. }))
    }

    pub fn updates(&self) -> Vec<IndexCall> {
        self.calls_matching(|call| matches!(call, IndexCall::Update { .. }))
    }

    pub fn cancels(&self) -> Vec<IndexCall> {
        self.calls_matching(|call| matches!(call, IndexCall::Cancel { .. }))
    }

    fn calls_matching(&self, pred: impl Fn(&IndexCall) -> bool) -> Vec<IndexCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| pred(call))
            .cloned()
            .collect()
    }

    pub fn is_cancelled(&self, id: usize) -> bool {
        self.state.lock().cancelled.get(id).copied().unwrap_or(false)
    }

    pub fn fail_next_open(&self, err: GeoIndexError) {
        self.state.lock().fail_next_open = Some(err);
    }

    pub fn fail_next_update(&self, err: GeoIndexError) {
        self.state.lock().fail_next_update = Some(err);
    }

    /// Events delivered synchronously from inside every later `open`.
    pub fn emit_on_open(&self, events: Vec<GeoIndexEvent>) {
        self.state.lock().emit_on_open = events;
    }

    /// Delivers `event` through the sink of subscription `id`.
    pub fn emit(&self, id: usize, event: GeoIndexEvent) {
        let sink = self.state.lock().sinks[id].clone();
        sink.emit(event);
    }
}

impl GeoIndex for RecordingIndex {
    fn open(
        &self,
        request: GeoQueryRequest,
        sink: GeoEventSink,
    ) -> Result<Box<dyn GeoSubscription>, GeoIndexError> {
        let (id, initial) = {
            let mut state = self.state.lock();
            if let Some(err) = state.fail_next_open.take() {
                return Err(err);
            }
            let id = state.sinks.len();
            state.sinks.push(sink.clone());
            state.cancelled.push(false);
            state.calls.push(IndexCall::Open {
                id,
                collection: request.collection,
                geometry: request.geometry,
                filters: request.filters,
            });
            (id, state.emit_on_open.clone())
        };

        for event in initial {
            sink.emit(event);
        }

        Ok(Box::new(RecordingSubscription {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct RecordingSubscription {
    id: usize,
    state: Arc<Mutex<RecorderState>>,
}

impl GeoSubscription for RecordingSubscription {
    fn update_criteria(
        &mut self,
        geometry: &QueryGeometry,
        filters: &FilterSet,
    ) -> Result<(), GeoIndexError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next_update.take() {
            return Err(err);
        }
        state.calls.push(IndexCall::Update {
            id: self.id,
            geometry: *geometry,
            filters: filters.clone(),
        });
        Ok(())
    }

    fn cancel(&mut self) {
        let mut state = self.state.lock();
        if !state.cancelled[self.id] {
            state.cancelled[self.id] = true;
            state.calls.push(IndexCall::Cancel { id: self.id });
        }
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, hour, 0, 0).unwrap()
}

pub fn area(lat: f64, lng: f64, radius_km: f64) -> QueryGeometry {
    QueryGeometry::new(GeoPoint::new(lat, lng), radius_km)
}

pub fn key_update(key: &str, record: GeoRecord) -> KeyUpdate {
    KeyUpdate {
        key: key.to_string(),
        location: GeoPoint::new(10.0, 20.0),
        distance_km: 0.0,
        data: Some(record),
    }
}

pub fn stamped(timestamp: DateTime<Utc>) -> GeoRecord {
    GeoRecord::new().with(TIMESTAMP_FIELD, timestamp.to_rfc3339())
}

pub fn multiplexer(index: &RecordingIndex) -> GeoMultiplexer {
    GeoMultiplexer::new(
        Arc::new(index.clone()),
        Arc::new(StaticTenant::new(DEALER)),
        TrackingConfig::default(),
    )
    .with_clock(Arc::new(FixedClock(today())))
}
