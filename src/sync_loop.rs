// Periodic per-resource sync loop.
// One timer task per resource; each tick spawns at most one fetch task for that resource.
// Results are applied under a lifecycle epoch so nothing is published after stop().

use crate::config::Resource;
use crate::error::{Result, SyncError};
use crate::fetcher::Fetcher;
use crate::snapshot::{Payload, ResourceSnapshot};
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout_at};
use tracing::{debug, info, instrument, warn};

/// Capacity of the `subscribe()` event channel (slow receivers lag and lose events).
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub type UpdateFn = Arc<dyn Fn(&str, &ResourceSnapshot) + Send + Sync>;
pub type ErrorFn = Arc<dyn Fn(&str, &SyncError) + Send + Sync>;

/// Callbacks fired after each applied fetch. They run on the fetch task and must not block.
#[derive(Clone, Default)]
pub struct Handlers {
    on_update: Option<UpdateFn>,
    on_error: Option<ErrorFn>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(
        mut self,
        f: impl Fn(&str, &ResourceSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str, &SyncError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Updated {
        resource: String,
        snapshot: ResourceSnapshot,
    },
    Failed {
        resource: String,
        error: SyncError,
    },
}

/// Per-resource bookkeeping, read-only outside the loop.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Epoch millis of the last applied successful fetch.
    pub last_success_timestamp: Option<i64>,
    pub last_error: Option<SyncError>,
    pub consecutive_failures: u32,
    pub successful_fetches: u64,
    pub failed_fetches: u64,
    /// Scheduled ticks fired, including skipped ones.
    pub ticks: u64,
    /// Ticks skipped because a fetch for the resource was still in flight.
    pub skipped_ticks: u64,
}

#[derive(Default)]
struct SlotState {
    sync: SyncState,
    snapshot: Option<ResourceSnapshot>,
}

struct ResourceSlot {
    resource: Resource,
    in_flight: Arc<Mutex<()>>,
    /// Deadline of the fetch holding `in_flight`, written right after the guard is taken.
    deadline: std::sync::Mutex<Option<Instant>>,
    state: RwLock<SlotState>,
}

impl ResourceSlot {
    fn try_claim(&self, deadline: Instant) -> Option<OwnedMutexGuard<()>> {
        let guard = self.in_flight.clone().try_lock_owned().ok()?;
        self.set_deadline(deadline);
        Some(guard)
    }

    async fn claim(&self, deadline: Instant) -> OwnedMutexGuard<()> {
        let guard = self.in_flight.clone().lock_owned().await;
        self.set_deadline(deadline);
        guard
    }

    fn set_deadline(&self, deadline: Instant) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = Some(deadline);
    }

    /// True if the fetch in flight has hit its deadline at `at` and is about to release the slot.
    fn overdue(&self, at: Instant) -> bool {
        self.deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|d| d <= at)
    }
}

struct Running {
    handles: Vec<JoinHandle<()>>,
}

/// Bumped on every start and stop; a fetch only applies if the epoch it began under is current.
struct Lifecycle {
    epoch: u64,
    running: Option<Running>,
}

struct Inner {
    slots: Vec<Arc<ResourceSlot>>,
    fetcher: Arc<dyn Fetcher>,
    handlers: Handlers,
    events: broadcast::Sender<SyncEvent>,
    lifecycle: RwLock<Lifecycle>,
    /// Epoch of the current run. Timer tasks exit when it changes; drop sets it to `u64::MAX`.
    shutdown_tx: watch::Sender<u64>,
}

pub struct SyncLoop {
    inner: Arc<Inner>,
}

impl SyncLoop {
    pub fn new(
        resources: Vec<Resource>,
        fetcher: Arc<dyn Fetcher>,
        handlers: Handlers,
    ) -> Result<Self> {
        let mut names = HashSet::new();
        for r in &resources {
            if r.name.is_empty() {
                return Err(SyncError::InvalidConfig("resource name must be non-empty".into()));
            }
            if !names.insert(r.name.clone()) {
                return Err(SyncError::InvalidConfig(format!(
                    "duplicate resource name {:?}",
                    r.name
                )));
            }
            if r.poll_interval.is_zero() {
                return Err(SyncError::InvalidConfig(format!(
                    "poll interval for {:?} must be > 0",
                    r.name
                )));
            }
            if r.max_entries == Some(0) {
                return Err(SyncError::InvalidConfig(format!(
                    "max_entries for {:?} must be > 0",
                    r.name
                )));
            }
        }
        let slots = resources
            .into_iter()
            .map(|resource| {
                Arc::new(ResourceSlot {
                    resource,
                    in_flight: Arc::new(Mutex::new(())),
                    deadline: std::sync::Mutex::new(None),
                    state: RwLock::new(SlotState::default()),
                })
            })
            .collect();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(Inner {
                slots,
                fetcher,
                handlers,
                events,
                lifecycle: RwLock::new(Lifecycle {
                    epoch: 0,
                    running: None,
                }),
                shutdown_tx,
            }),
        })
    }

    /// Starts one timer per resource. The first tick fires immediately.
    /// Returns `SyncError::AlreadyRunning` (non-fatal, nothing changes) if already started.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.write().await;
        if lifecycle.running.is_some() {
            warn!("start() called while sync loop is already running");
            return Err(SyncError::AlreadyRunning);
        }
        lifecycle.epoch += 1;
        let epoch = lifecycle.epoch;
        self.inner.shutdown_tx.send_replace(epoch);
        let handles = self
            .inner
            .slots
            .iter()
            .map(|slot| {
                tokio::spawn(schedule(
                    self.inner.clone(),
                    slot.clone(),
                    epoch,
                    self.inner.shutdown_tx.subscribe(),
                ))
            })
            .collect();
        lifecycle.running = Some(Running { handles });
        info!(resources = self.inner.slots.len(), epoch, "Sync loop started");
        Ok(())
    }

    /// Cancels all timers. Fetches still in flight run to completion in the background
    /// but their results are discarded; no callback or event fires once this returns.
    pub async fn stop(&self) {
        let running = {
            // Taking the write lock waits out any result currently being applied.
            let mut lifecycle = self.inner.lifecycle.write().await;
            lifecycle.epoch += 1;
            self.inner.shutdown_tx.send_replace(lifecycle.epoch);
            lifecycle.running.take()
        };
        let Some(running) = running else {
            debug!("stop() called while sync loop is not running");
            return;
        };
        for result in join_all(running.handles).await {
            if let Err(e) = result {
                warn!(error = %e, "resource scheduler task failed");
            }
        }
        info!("Sync loop stopped");
    }

    /// Fetches one resource now, outside its schedule. Waits for an in-flight fetch of the
    /// same resource to finish first. The periodic schedule is left untouched.
    ///
    /// Callbacks fire only while the loop is running. If the loop is stopped or restarted
    /// while this fetch is in flight, the snapshot is returned unapplied with version 0.
    pub async fn fetch_once(&self, name: &str) -> Result<ResourceSnapshot> {
        let slot = self.inner.slot(name)?;
        let deadline = Instant::now() + slot.resource.poll_interval;
        let guard = slot.claim(deadline).await;
        let epoch = self.inner.lifecycle.read().await.epoch;
        self.inner.run_fetch(&slot, epoch, deadline, guard).await
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lifecycle.read().await.running.is_some()
    }

    /// Current snapshot of a resource, `None` until its first successful fetch.
    pub async fn snapshot(&self, name: &str) -> Option<ResourceSnapshot> {
        let slot = self.inner.slot(name).ok()?;
        slot.state.read().await.snapshot.clone()
    }

    pub async fn state(&self, name: &str) -> Option<SyncState> {
        let slot = self.inner.slot(name).ok()?;
        Some(slot.state.read().await.sync.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.inner.slots.iter().map(|s| &s.resource)
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        // Timer tasks hold the inner state alive until told to exit. Results still in
        // flight no longer match the signalled epoch and are discarded.
        self.inner.shutdown_tx.send_replace(u64::MAX);
    }
}

impl Inner {
    fn slot(&self, name: &str) -> Result<Arc<ResourceSlot>> {
        self.slots
            .iter()
            .find(|s| s.resource.name == name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownResource(name.to_string()))
    }

    /// Fetch, parse and apply one cycle. `_guard` holds the resource's in-flight slot
    /// and the fetch fails with `Timeout` once `deadline` passes.
    async fn run_fetch(
        &self,
        slot: &ResourceSlot,
        epoch: u64,
        deadline: Instant,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<ResourceSnapshot> {
        let resource = &slot.resource;
        let outcome = match timeout_at(deadline, self.fetcher.fetch(&resource.endpoint)).await {
            Ok(Ok(body)) => Payload::parse(resource.kind, &body, resource.max_entries),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SyncError::Timeout(resource.poll_interval)),
        };
        self.complete(slot, epoch, outcome).await
    }

    async fn complete(
        &self,
        slot: &ResourceSlot,
        epoch: u64,
        outcome: Result<Payload>,
    ) -> Result<ResourceSnapshot> {
        let name = slot.resource.name.as_str();
        let lifecycle = self.lifecycle.read().await;
        if lifecycle.epoch != epoch || *self.shutdown_tx.borrow() != epoch {
            debug!(resource = name, "discarding fetch result from a previous run");
            return outcome.map(|p| p.into_snapshot(0, now_millis()));
        }
        let publish = lifecycle.running.is_some();

        match outcome {
            Ok(payload) => {
                let snapshot = {
                    let mut state = slot.state.write().await;
                    let now = now_millis();
                    state.sync.consecutive_failures = 0;
                    state.sync.last_success_timestamp = Some(now);
                    state.sync.successful_fetches = state.sync.successful_fetches.saturating_add(1);
                    let snapshot = payload.into_snapshot(state.sync.successful_fetches, now);
                    state.snapshot = Some(snapshot.clone());
                    snapshot
                };
                debug!(
                    resource = name,
                    entries = snapshot.len(),
                    version = snapshot.version(),
                    "Snapshot replaced"
                );
                if publish {
                    if let Some(f) = &self.handlers.on_update {
                        f(name, &snapshot);
                    }
                    let _ = self.events.send(SyncEvent::Updated {
                        resource: name.to_string(),
                        snapshot: snapshot.clone(),
                    });
                }
                Ok(snapshot)
            }
            Err(e) => {
                let consecutive_failures = {
                    let mut state = slot.state.write().await;
                    state.sync.consecutive_failures =
                        state.sync.consecutive_failures.saturating_add(1);
                    state.sync.failed_fetches = state.sync.failed_fetches.saturating_add(1);
                    state.sync.last_error = Some(e.clone());
                    state.sync.consecutive_failures
                };
                warn!(
                    resource = name,
                    error = %e,
                    consecutive_failures,
                    operation = "fetch",
                    "fetch failed"
                );
                if publish {
                    if let Some(f) = &self.handlers.on_error {
                        f(name, &e);
                    }
                    let _ = self.events.send(SyncEvent::Failed {
                        resource: name.to_string(),
                        error: e.clone(),
                    });
                }
                Err(e)
            }
        }
    }
}

#[instrument(skip_all, fields(resource = %slot.resource.name, epoch = epoch))]
async fn schedule(
    inner: Arc<Inner>,
    slot: Arc<ResourceSlot>,
    epoch: u64,
    mut shutdown_rx: watch::Receiver<u64>,
) {
    let mut tick = interval(slot.resource.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            tick_at = tick.tick() => {
                // Each fetch gets one interval from its tick, so a fetch that times out
                // releases the slot exactly when the next tick fires.
                let deadline = tick_at + slot.resource.poll_interval;
                let guard = match slot.try_claim(deadline) {
                    Some(guard) => Some(guard),
                    None if slot.overdue(tick_at) => Some(slot.claim(deadline).await),
                    None => None,
                };
                {
                    let mut state = slot.state.write().await;
                    state.sync.ticks = state.sync.ticks.saturating_add(1);
                    if guard.is_none() {
                        state.sync.skipped_ticks = state.sync.skipped_ticks.saturating_add(1);
                    }
                }
                match guard {
                    Some(guard) => {
                        let inner = inner.clone();
                        let slot = slot.clone();
                        tokio::spawn(async move {
                            let _ = inner.run_fetch(&slot, epoch, deadline, guard).await;
                        });
                    }
                    None => {
                        debug!("previous fetch still in flight; skipping tick");
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                debug!("Resource scheduler shutting down");
                break;
            }
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
