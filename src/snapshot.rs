// Immutable per-resource snapshots and response body parsing

use crate::error::Result;
use crate::models::{AnomalyEvent, ResourceKind, Sample};
use std::sync::Arc;

/// Latest known-good list for one resource. Replaced wholesale, never mutated;
/// clones share the same backing slice.
#[derive(Debug)]
pub struct Snapshot<T> {
    entries: Arc<[T]>,
    version: u64,
    fetched_at: i64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            version: self.version,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> Snapshot<T> {
    fn new(entries: Vec<T>, version: u64, fetched_at: i64) -> Self {
        Self {
            entries: entries.into(),
            version,
            fetched_at,
        }
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of replacements for this resource, starting at 1 for the first successful fetch.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Epoch millis at which the fetch that produced this snapshot completed.
    pub fn fetched_at(&self) -> i64 {
        self.fetched_at
    }
}

#[derive(Debug, Clone)]
pub enum ResourceSnapshot {
    Traffic(Snapshot<Sample>),
    Anomalies(Snapshot<AnomalyEvent>),
}

impl ResourceSnapshot {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSnapshot::Traffic(_) => ResourceKind::Traffic,
            ResourceSnapshot::Anomalies(_) => ResourceKind::Anomalies,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            ResourceSnapshot::Traffic(s) => s.version(),
            ResourceSnapshot::Anomalies(s) => s.version(),
        }
    }

    pub fn fetched_at(&self) -> i64 {
        match self {
            ResourceSnapshot::Traffic(s) => s.fetched_at(),
            ResourceSnapshot::Anomalies(s) => s.fetched_at(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResourceSnapshot::Traffic(s) => s.len(),
            ResourceSnapshot::Anomalies(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_traffic(&self) -> Option<&Snapshot<Sample>> {
        match self {
            ResourceSnapshot::Traffic(s) => Some(s),
            ResourceSnapshot::Anomalies(_) => None,
        }
    }

    pub fn as_anomalies(&self) -> Option<&Snapshot<AnomalyEvent>> {
        match self {
            ResourceSnapshot::Anomalies(s) => Some(s),
            ResourceSnapshot::Traffic(_) => None,
        }
    }
}

/// A parsed response body not yet stamped with a version.
#[derive(Debug)]
pub(crate) enum Payload {
    Traffic(Vec<Sample>),
    Anomalies(Vec<AnomalyEvent>),
}

impl Payload {
    /// Parse a JSON array of the kind's entity type, keeping at most the last `max_entries`.
    pub(crate) fn parse(
        kind: ResourceKind,
        body: &[u8],
        max_entries: Option<usize>,
    ) -> Result<Self> {
        let payload = match kind {
            ResourceKind::Traffic => {
                Payload::Traffic(retain_newest(serde_json::from_slice(body)?, max_entries))
            }
            ResourceKind::Anomalies => {
                Payload::Anomalies(retain_newest(serde_json::from_slice(body)?, max_entries))
            }
        };
        Ok(payload)
    }

    pub(crate) fn into_snapshot(self, version: u64, fetched_at: i64) -> ResourceSnapshot {
        match self {
            Payload::Traffic(v) => ResourceSnapshot::Traffic(Snapshot::new(v, version, fetched_at)),
            Payload::Anomalies(v) => {
                ResourceSnapshot::Anomalies(Snapshot::new(v, version, fetched_at))
            }
        }
    }
}

fn retain_newest<T>(mut entries: Vec<T>, max_entries: Option<usize>) -> Vec<T> {
    if let Some(max) = max_entries
        && entries.len() > max
    {
        let excess = entries.len() - max;
        entries.drain(..excess);
    }
    entries
}
