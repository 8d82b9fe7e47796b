//! Time-window filter for assignment events.

use geotrack_model::{GeoRecord, KeyUpdate, TimeWindow, TrackedKind};

/// True iff the record's timestamp lies within `window`, bounds included.
/// Records without a readable timestamp never pass.
pub fn passes(record: &GeoRecord, window: &TimeWindow) -> bool {
    record
        .timestamp()
        .is_some_and(|timestamp| window.contains(timestamp))
}

/// Applies `window` to a key update when `kind` is subject to windowing.
pub(crate) fn admits(kind: TrackedKind, window: Option<&TimeWindow>, update: &KeyUpdate) -> bool {
    match window {
        Some(window) if kind.is_windowed() => update
            .data
            .as_ref()
            .is_some_and(|record| passes(record, window)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use geotrack_model::GeoPoint;
    use geotrack_model::record::TIMESTAMP_FIELD;

    fn window() -> TimeWindow {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();
        TimeWindow::new(start, start + Duration::hours(8)).unwrap()
    }

    fn update(record: Option<GeoRecord>) -> KeyUpdate {
        KeyUpdate {
            key: "a-1".into(),
            location: GeoPoint::new(0.0, 0.0),
            distance_km: 0.0,
            data: record,
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let window = window();
        let at = |ts: chrono::DateTime<Utc>| {
            GeoRecord::new().with(TIMESTAMP_FIELD, ts.timestamp_millis())
        };

        assert!(passes(&at(window.start), &window));
        assert!(passes(&at(window.end), &window));
        assert!(passes(&at(window.start + Duration::hours(1)), &window));
        assert!(!passes(&at(window.start - Duration::milliseconds(1)), &window));
        assert!(!passes(&at(window.end + Duration::milliseconds(1)), &window));
    }

    #[test]
    fn workers_bypass_the_window() {
        let window = window();
        assert!(admits(TrackedKind::Worker, Some(&window), &update(None)));
        assert!(!admits(TrackedKind::Assignment, Some(&window), &update(None)));
        assert!(admits(TrackedKind::Assignment, None, &update(None)));
    }
}
