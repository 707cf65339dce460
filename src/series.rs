// Chart series shaping for the dashboard renderer.
// Labels and time formatting stay with the renderer; points carry raw epoch millis.

use crate::models::{AnomalyEvent, Sample, Severity};
use crate::snapshot::ResourceSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub label: &'static str,
    pub points: Vec<Point>,
}

pub const TRAFFIC_LABEL: &str = "Network Traffic (bytes)";
pub const ANOMALY_LABEL: &str = "Anomalies";

impl Severity {
    /// Bar height on the anomaly chart.
    pub fn chart_weight(&self) -> f64 {
        match self {
            Severity::High | Severity::Critical => 1.0,
            Severity::Low | Severity::Medium => 0.5,
        }
    }
}

pub fn traffic_series(samples: &[Sample]) -> Series {
    Series {
        label: TRAFFIC_LABEL,
        points: samples
            .iter()
            .map(|s| Point {
                timestamp: s.timestamp,
                value: s.bytes as f64,
            })
            .collect(),
    }
}

pub fn anomaly_series(events: &[AnomalyEvent]) -> Series {
    Series {
        label: ANOMALY_LABEL,
        points: events
            .iter()
            .map(|e| Point {
                timestamp: e.timestamp,
                value: e.severity.chart_weight(),
            })
            .collect(),
    }
}

impl From<&ResourceSnapshot> for Series {
    fn from(snapshot: &ResourceSnapshot) -> Self {
        match snapshot {
            ResourceSnapshot::Traffic(s) => traffic_series(s.entries()),
            ResourceSnapshot::Anomalies(s) => anomaly_series(s.entries()),
        }
    }
}
