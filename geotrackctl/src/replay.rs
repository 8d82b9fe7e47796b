//! Drives a [`Scenario`] against the in-memory index and writes every
//! outward event as one JSON line.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use geotrack_contracts::{Clock, FixedClock, StaticTenant, SystemClock};
use geotrack_core::TrackingError;
use geotrack_core::infra::memory_index::InMemoryGeoIndex;
use geotrack_core::tracking::{GeoEventReceiver, GeoMultiplexer};
use geotrack_model::GeoEvent;

use crate::config::CtlConfig;
use crate::scenario::{Scenario, Step};

#[derive(Serialize)]
#[serde(untagged)]
enum ReplayLine<'a> {
    Event {
        step: usize,
        #[serde(flatten)]
        event: &'a GeoEvent,
    },
    Failure {
        step: usize,
        op: &'static str,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub events: usize,
    pub failures: usize,
}

struct Replay<'w, W: Write> {
    index: InMemoryGeoIndex,
    tracker: GeoMultiplexer,
    receiver: GeoEventReceiver,
    out: &'w mut W,
    summary: ReplaySummary,
}

pub async fn run<W: Write>(
    scenario: Scenario,
    config: &CtlConfig,
    drain: Duration,
    out: &mut W,
) -> anyhow::Result<ReplaySummary> {
    let tenant = scenario
        .tenant_id
        .clone()
        .or_else(|| config.tenant_id.clone());
    let tenant = match tenant {
        Some(id) => StaticTenant::new(id.as_str()),
        None => StaticTenant::unset(),
    };
    let clock: Arc<dyn Clock> = match scenario.today {
        Some(day) => Arc::new(FixedClock(day)),
        None => Arc::new(SystemClock),
    };

    let index = InMemoryGeoIndex::new();
    for doc in &scenario.documents {
        index.set(&doc.collection, &doc.key, doc.location, doc.record.clone());
    }

    let tracker = GeoMultiplexer::new(
        Arc::new(index.clone()),
        Arc::new(tenant),
        config.tracking.clone(),
    )
    .with_clock(clock);
    let receiver = tracker.events().subscribe();

    let mut replay = Replay {
        index,
        tracker,
        receiver,
        out,
        summary: ReplaySummary::default(),
    };

    info!(
        documents = scenario.documents.len(),
        steps = scenario.steps.len(),
        "replaying scenario"
    );
    for (position, step) in scenario.steps.iter().enumerate() {
        replay.apply(position, step)?;
        replay.flush(position)?;
    }

    let last = scenario.steps.len().saturating_sub(1);
    replay.settle(last, drain).await?;
    replay.tracker.shutdown();

    Ok(replay.summary)
}

impl<W: Write> Replay<'_, W> {
    fn apply(&mut self, position: usize, step: &Step) -> anyhow::Result<()> {
        self.summary.steps += 1;
        let outcome: Result<(), TrackingError> = match step {
            Step::TrackWorkers {
                geometry,
                work_group,
            } => self
                .tracker
                .track_workers(*geometry, work_group.as_deref())
                .map(drop),
            Step::TrackAssignments {
                geometry,
                status,
                start,
                end,
            } => self
                .tracker
                .track_assignments(*geometry, status.as_deref(), *start, *end)
                .map(drop),
            Step::TrackWorkersAndAssignments {
                geometry,
                status,
                day,
                start,
                end,
            } => self
                .tracker
                .track_workers_and_assignments(*geometry, status.as_deref(), *day, *start, *end)
                .map(drop),
            Step::Set(doc) => {
                self.index
                    .set(&doc.collection, &doc.key, doc.location, doc.record.clone());
                Ok(())
            }
            Step::Remove { collection, key } => {
                if !self.index.remove(collection, key) {
                    warn!(%collection, %key, "remove of unknown document");
                }
                Ok(())
            }
            Step::StopWorkers => {
                self.tracker.stop_workers();
                Ok(())
            }
            Step::StopAssignments => {
                self.tracker.stop_assignments();
                Ok(())
            }
            Step::Fail {
                collection,
                message,
                terminal,
            } => {
                if *terminal {
                    self.index.fail_collection(collection, message);
                } else {
                    self.index.report_error(collection, message);
                }
                Ok(())
            }
        };

        if let Err(err) = outcome {
            warn!(step = position, op = step.op(), error = %err, "step rejected");
            self.summary.failures += 1;
            self.write(&ReplayLine::Failure {
                step: position,
                op: step.op(),
                error: err.to_string(),
            })?;
        }
        Ok(())
    }

    fn flush(&mut self, position: usize) -> anyhow::Result<()> {
        for event in self.receiver.drain() {
            self.emit(position, &event)?;
        }
        Ok(())
    }

    /// Waits up to `drain` for events delivered after the last step.
    async fn settle(&mut self, position: usize, drain: Duration) -> anyhow::Result<()> {
        self.flush(position)?;
        if drain.is_zero() {
            return Ok(());
        }
        let deadline = tokio::time::Instant::now() + drain;
        while let Ok(Some(event)) =
            tokio::time::timeout_at(deadline, self.receiver.recv()).await
        {
            self.emit(position, &event)?;
        }
        Ok(())
    }

    fn emit(&mut self, position: usize, event: &GeoEvent) -> anyhow::Result<()> {
        self.summary.events += 1;
        self.write(&ReplayLine::Event {
            step: position,
            event,
        })
    }

    fn write(&mut self, line: &ReplayLine<'_>) -> anyhow::Result<()> {
        let json = serde_json::to_string(line).context("failed to encode replay line")?;
        writeln!(self.out, "{json}").context("failed to write replay output")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use geotrack_model::filters::{TENANT_FIELD, TYPE_FIELD};
    use geotrack_model::{GeoPoint, GeoRecord, QueryGeometry};
    use serde_json::Value;

    use crate::scenario::Document;

    fn lines(out: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn worker_doc(key: &str, lat: f64) -> Document {
        Document::new(
            "users",
            key,
            GeoPoint::new(lat, 20.0),
            GeoRecord::new()
                .with(TENANT_FIELD, "dealer-7")
                .with(TYPE_FIELD, "worker"),
        )
    }

    #[tokio::test]
    async fn replays_steps_into_json_lines() {
        let area = QueryGeometry::new(GeoPoint::new(10.0, 20.0), 5.0);
        let scenario = Scenario {
            tenant_id: Some("dealer-7".into()),
            today: NaiveDate::from_ymd_opt(2026, 10, 18),
            documents: vec![worker_doc("w-1", 10.0)],
            steps: vec![
                Step::TrackWorkers {
                    geometry: Some(area),
                    work_group: None,
                },
                Step::Set(worker_doc("w-1", 11.0)),
                Step::StopWorkers,
                Step::Set(worker_doc("w-1", 10.0)),
            ],
        };

        let mut out = Vec::new();
        let summary = run(scenario, &CtlConfig::default(), Duration::ZERO, &mut out)
            .await
            .unwrap();

        let lines = lines(&out);
        let trail: Vec<_> = lines
            .iter()
            .map(|line| (line["step"].as_u64().unwrap(), line["event"].as_str().unwrap()))
            .collect();
        assert_eq!(trail, vec![(0, "entered"), (0, "ready"), (1, "exited")]);
        assert_eq!(lines[0]["entity"], "worker");
        assert_eq!(lines[0]["key"], "w-1");
        assert_eq!(
            summary,
            ReplaySummary {
                steps: 4,
                events: 3,
                failures: 0
            }
        );
    }

    #[tokio::test]
    async fn rejected_steps_are_reported_and_replay_continues() {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 17, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();
        let scenario = Scenario {
            steps: vec![
                Step::TrackWorkers {
                    geometry: None,
                    work_group: None,
                },
                Step::TrackAssignments {
                    geometry: Some(QueryGeometry::new(GeoPoint::new(0.0, 0.0), 1.0)),
                    status: None,
                    start,
                    end,
                },
            ],
            ..Scenario::default()
        };
        let config = CtlConfig {
            tenant_id: Some("dealer-7".into()),
            ..CtlConfig::default()
        };

        let mut out = Vec::new();
        let summary = run(scenario, &config, Duration::ZERO, &mut out)
            .await
            .unwrap();

        let lines = lines(&out);
        assert_eq!(summary.failures, 2);
        assert_eq!(lines[0]["op"], "track_workers");
        assert!(lines[0]["error"].as_str().unwrap().contains("geometry"));
        assert_eq!(lines[1]["op"], "track_assignments");
    }
}
