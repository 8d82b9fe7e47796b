//! In-process geo index with live radius queries.
//!
//! Mirrors the behaviour of a hosted geo index closely enough to drive the
//! multiplexer end to end: opening a query reports every matching document
//! inside the radius and then `Ready`; writes re-evaluate every live query on
//! the written collection and report entries, exits and moves.
//!
//! Events are emitted while the index lock is held so each query observes
//! changes in write order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use geotrack_contracts::{
    GeoEventSink, GeoIndex, GeoIndexError, GeoIndexEvent, GeoQueryRequest, GeoSubscription,
};
use geotrack_model::{FilterSet, GeoPoint, GeoRecord, KeyUpdate, QueryGeometry};

#[derive(Debug, Clone, PartialEq)]
struct StoredDocument {
    location: GeoPoint,
    record: GeoRecord,
}

impl StoredDocument {
    fn update_for(&self, key: &str, center: &GeoPoint) -> KeyUpdate {
        KeyUpdate {
            key: key.to_string(),
            location: self.location,
            distance_km: center.distance_km(&self.location),
            data: Some(self.record.clone()),
        }
    }
}

struct LiveQuery {
    collection: String,
    geometry: QueryGeometry,
    filters: FilterSet,
    sink: GeoEventSink,
    /// Keys currently inside the query.
    members: BTreeSet<String>,
}

impl LiveQuery {
    fn admits(&self, doc: &StoredDocument) -> bool {
        self.filters.matches(doc.record.fields()) && self.geometry.contains(&doc.location)
    }
}

#[derive(Default)]
struct IndexState {
    collections: HashMap<String, BTreeMap<String, StoredDocument>>,
    queries: BTreeMap<u64, LiveQuery>,
    next_query_id: u64,
}

/// Thread-safe in-memory [`GeoIndex`].
#[derive(Clone, Default)]
pub struct InMemoryGeoIndex {
    state: Arc<Mutex<IndexState>>,
}

impl fmt::Debug for InMemoryGeoIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryGeoIndex")
            .field("collections", &state.collections.len())
            .field("live_queries", &state.queries.len())
            .finish()
    }
}

impl InMemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document and notify live queries on its collection.
    pub fn set(&self, collection: &str, key: &str, location: GeoPoint, record: GeoRecord) {
        let mut state = self.state.lock();
        let doc = StoredDocument { location, record };
        let previous = state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc.clone());

        for query in state.queries.values_mut() {
            if query.collection != collection {
                continue;
            }
            let was_member = query.members.contains(key);
            let is_member = query.admits(&doc);
            let update = doc.update_for(key, &query.geometry.center);

            match (was_member, is_member) {
                (false, true) => {
                    query.members.insert(key.to_string());
                    query.sink.emit(GeoIndexEvent::KeyEntered(update));
                }
                (true, false) => {
                    query.members.remove(key);
                    query.sink.emit(GeoIndexEvent::KeyExited(update));
                }
                (true, true) => {
                    let moved = previous
                        .as_ref()
                        .is_none_or(|previous| previous.location != doc.location);
                    if moved {
                        query.sink.emit(GeoIndexEvent::KeyMoved(update));
                    }
                }
                (false, false) => {}
            }
        }
    }

    /// Delete a document; live queries holding it report an exit.
    pub fn remove(&self, collection: &str, key: &str) -> bool {
        let mut state = self.state.lock();
        let Some(doc) = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(key))
        else {
            return false;
        };

        for query in state.queries.values_mut() {
            if query.collection == collection && query.members.remove(key) {
                let update = doc.update_for(key, &query.geometry.center);
                query.sink.emit(GeoIndexEvent::KeyExited(update));
            }
        }
        true
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<(GeoPoint, GeoRecord)> {
        let state = self.state.lock();
        state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|doc| (doc.location, doc.record.clone()))
    }

    /// Report a non-fatal transport error to every live query on `collection`.
    pub fn report_error(&self, collection: &str, message: &str) {
        let state = self.state.lock();
        for query in state.queries.values() {
            if query.collection == collection {
                query.sink.emit(GeoIndexEvent::Error {
                    message: message.to_string(),
                    terminal: false,
                });
            }
        }
    }

    /// Tear down every live query on `collection` with a terminal error.
    pub fn fail_collection(&self, collection: &str, message: &str) -> usize {
        let mut state = self.state.lock();
        let failed: Vec<u64> = state
            .queries
            .iter()
            .filter(|(_, query)| query.collection == collection)
            .map(|(id, _)| *id)
            .collect();

        for id in &failed {
            if let Some(query) = state.queries.remove(id) {
                query.sink.emit(GeoIndexEvent::Error {
                    message: message.to_string(),
                    terminal: true,
                });
            }
        }
        if !failed.is_empty() {
            warn!(collection, count = failed.len(), %message, "live queries torn down");
        }
        failed.len()
    }

    pub fn live_query_count(&self) -> usize {
        self.state.lock().queries.len()
    }

    fn validate(geometry: &QueryGeometry, filters: &FilterSet) -> Result<(), GeoIndexError> {
        geometry
            .validate()
            .map_err(|err| GeoIndexError::InvalidGeometry(err.to_string()))?;
        if let Some(filter) = filters.iter().find(|filter| filter.field.trim().is_empty()) {
            return Err(GeoIndexError::InvalidFilter(format!(
                "empty field name in `{filter}`"
            )));
        }
        Ok(())
    }
}

impl GeoIndex for InMemoryGeoIndex {
    fn open(
        &self,
        request: GeoQueryRequest,
        sink: GeoEventSink,
    ) -> Result<Box<dyn GeoSubscription>, GeoIndexError> {
        Self::validate(&request.geometry, &request.filters)?;

        let mut state = self.state.lock();
        let id = state.next_query_id;
        state.next_query_id += 1;

        let mut query = LiveQuery {
            collection: request.collection,
            geometry: request.geometry,
            filters: request.filters,
            sink,
            members: BTreeSet::new(),
        };

        if let Some(docs) = state.collections.get(&query.collection) {
            for (key, doc) in docs {
                if query.admits(doc) {
                    query.members.insert(key.clone());
                    let update = doc.update_for(key, &query.geometry.center);
                    query.sink.emit(GeoIndexEvent::KeyEntered(update));
                }
            }
        }
        query.sink.emit(GeoIndexEvent::Ready);

        debug!(
            query_id = id,
            collection = %query.collection,
            members = query.members.len(),
            "live query opened"
        );
        state.queries.insert(id, query);

        Ok(Box::new(MemorySubscription {
            id,
            state: Arc::downgrade(&self.state),
        }))
    }
}

struct MemorySubscription {
    id: u64,
    state: Weak<Mutex<IndexState>>,
}

impl GeoSubscription for MemorySubscription {
    fn update_criteria(
        &mut self,
        geometry: &QueryGeometry,
        filters: &FilterSet,
    ) -> Result<(), GeoIndexError> {
        InMemoryGeoIndex::validate(geometry, filters)?;

        let state = self.state.upgrade().ok_or(GeoIndexError::Closed)?;
        let mut state = state.lock();
        let IndexState {
            collections,
            queries,
            ..
        } = &mut *state;
        let query = queries.get_mut(&self.id).ok_or(GeoIndexError::Closed)?;

        query.geometry = *geometry;
        query.filters = filters.clone();

        let empty = BTreeMap::new();
        let docs = collections.get(&query.collection).unwrap_or(&empty);

        let exited: Vec<String> = query
            .members
            .iter()
            .filter(|key| docs.get(*key).is_none_or(|doc| !query.admits(doc)))
            .cloned()
            .collect();
        for key in exited {
            query.members.remove(&key);
            if let Some(doc) = docs.get(&key) {
                let update = doc.update_for(&key, &query.geometry.center);
                query.sink.emit(GeoIndexEvent::KeyExited(update));
            }
        }

        for (key, doc) in docs {
            if !query.members.contains(key) && query.admits(doc) {
                query.members.insert(key.clone());
                let update = doc.update_for(key, &query.geometry.center);
                query.sink.emit(GeoIndexEvent::KeyEntered(update));
            }
        }

        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(state) = self.state.upgrade()
            && state.lock().queries.remove(&self.id).is_some()
        {
            debug!(query_id = self.id, "live query cancelled");
        }
    }
}
