// Shared test helpers: scripted fetcher and callback recorder
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use dashsync::config::Resource;
use dashsync::error::Result;
use dashsync::fetcher::Fetcher;
use dashsync::models::ResourceKind;
use dashsync::{ErrorKind, Handlers, SyncError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const ONE_SAMPLE: &str = r#"[{"timestamp":1000,"bytes":500}]"#;

pub fn resource(name: &str, kind: ResourceKind, interval_ms: u64) -> Resource {
    let endpoint = Url::parse(&format!("http://fake.invalid/{}", name)).unwrap();
    Resource::new(name, kind, endpoint, Duration::from_millis(interval_ms))
}

/// One scripted fetch outcome.
#[derive(Clone)]
pub struct Step {
    pub delay: Duration,
    pub reply: std::result::Result<String, SyncError>,
}

impl Step {
    pub fn ok(body: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Ok(body.to_string()),
        }
    }

    pub fn fail(error: SyncError) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Err(error),
        }
    }

    pub fn after(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }
}

/// Replays scripted steps in order, then repeats `fallback`. Tracks concurrency.
pub struct FakeFetcher {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new(vec![], step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, _endpoint: &Url) -> Result<Bytes> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.reply.map(Bytes::from)
    }
}

/// Records every callback invocation as (resource, version) / (resource, kind).
#[derive(Clone, Default)]
pub struct Recorder {
    updates: Arc<Mutex<Vec<(String, u64)>>>,
    errors: Arc<Mutex<Vec<(String, ErrorKind)>>>,
}

impl Recorder {
    pub fn handlers(&self) -> Handlers {
        let updates = self.updates.clone();
        let errors = self.errors.clone();
        Handlers::new()
            .on_update(move |name, snapshot| {
                updates
                    .lock()
                    .unwrap()
                    .push((name.to_string(), snapshot.version()));
            })
            .on_error(move |name, error| {
                errors.lock().unwrap().push((name.to_string(), error.kind()));
            })
    }

    pub fn updates(&self) -> Vec<(String, u64)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(String, ErrorKind)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn updates_for(&self, name: &str) -> usize {
        self.updates().iter().filter(|(n, _)| n == name).count()
    }

    pub fn errors_for(&self, name: &str) -> usize {
        self.errors().iter().filter(|(n, _)| n == name).count()
    }
}

/// Dispatches to a per-resource fake by the last endpoint path segment (the resource name).
pub struct ByEndpoint(pub Vec<(&'static str, Arc<FakeFetcher>)>);

#[async_trait]
impl Fetcher for ByEndpoint {
    async fn fetch(&self, endpoint: &Url) -> Result<Bytes> {
        let name = endpoint.path().trim_start_matches('/');
        match self.0.iter().find(|(n, _)| *n == name) {
            Some((_, fetcher)) => fetcher.fetch(endpoint).await,
            None => Err(SyncError::Network(format!("no route for {}", endpoint))),
        }
    }
}
