use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document field read by the time-window filter.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Document payload delivered alongside a key event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeoRecord(pub Map<String, Value>);

impl GeoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON value; non-object values yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Reads `timestamp` as RFC 3339 text or integer epoch milliseconds.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.0.get(TIMESTAMP_FIELD)? {
            Value::String(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            Value::Number(number) => number
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_rfc3339_and_millis_timestamps() {
        let text = GeoRecord::new().with(TIMESTAMP_FIELD, "2026-10-18T08:30:00+02:00");
        let expected = Utc.with_ymd_and_hms(2026, 10, 18, 6, 30, 0).unwrap();
        assert_eq!(text.timestamp(), Some(expected));

        let millis = GeoRecord::new().with(TIMESTAMP_FIELD, expected.timestamp_millis());
        assert_eq!(millis.timestamp(), Some(expected));
    }

    #[test]
    fn unreadable_timestamp_is_none() {
        assert_eq!(GeoRecord::new().timestamp(), None);
        assert_eq!(
            GeoRecord::new().with(TIMESTAMP_FIELD, "yesterday").timestamp(),
            None
        );
        assert_eq!(GeoRecord::new().with(TIMESTAMP_FIELD, true).timestamp(), None);
        assert!(GeoRecord::from_value(json!([1, 2])).is_none());
    }
}
