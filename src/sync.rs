//! Analytics sync engine.
//!
//! Three triggers refresh the analytics table: the immediate fetch on
//! [`SyncEngine::start`], the recurring poll, and [`SyncEngine::refresh_now`]
//! after a link is created. They all funnel into [`SyncEngine::fetch_once`],
//! which tags each request with a sequence number. A completion only replaces
//! the snapshot if no newer-issued fetch has already been applied, so a slow
//! response can never overwrite fresher data.
//!
//! State lives in a `watch` channel whose sender only the engine holds;
//! consumers get read-only receivers via [`SyncEngine::subscribe`].

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, Weak,
};
use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    client::AnalyticsSource,
    error::DashboardError,
    models::{AnalyticsRow, AnalyticsSnapshot, SyncStatus},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Lets other components ask for an out-of-band refresh without knowing
/// about the engine.
pub trait RefreshTrigger: Send + Sync {
    fn refresh_now(&self);
}

/// What consumers observe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub status: SyncStatus,
    pub snapshot: AnalyticsSnapshot,
    /// Sequence number of the fetch that produced `snapshot`; 0 until the
    /// first successful load.
    pub last_applied: u64,
}

impl SyncState {
    pub fn has_loaded(&self) -> bool {
        self.last_applied > 0
    }

    /// Fold one completed fetch into the state. Returns whether anything changed.
    fn apply(&mut self, seq: u64, outcome: Result<Vec<AnalyticsRow>, DashboardError>) -> bool {
        match outcome {
            Ok(rows) => {
                if seq <= self.last_applied {
                    tracing::debug!(
                        "Dropping analytics fetch #{} (already applied #{})",
                        seq,
                        self.last_applied
                    );
                    return false;
                }
                if self.status != SyncStatus::Ready {
                    tracing::info!("Analytics loaded ({} row(s))", rows.len());
                }
                self.snapshot = rows;
                self.last_applied = seq;
                self.status = SyncStatus::Ready;
                true
            }
            Err(e) if self.has_loaded() => {
                tracing::warn!("Analytics poll #{} failed, keeping last snapshot: {}", seq, e);
                false
            }
            Err(e) => {
                tracing::error!("Failed to load analytics: {}", e);
                let status = SyncStatus::Error(e.to_string());
                if self.status == status {
                    return false;
                }
                self.status = status;
                true
            }
        }
    }
}

/// Owns the polling task. Dropping it stops the timer; fetches that were
/// already spawned run to completion.
struct Poller(JoinHandle<()>);

impl Drop for Poller {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct EngineInner {
    source: Arc<dyn AnalyticsSource>,
    interval: Duration,
    state: watch::Sender<SyncState>,
    next_seq: AtomicU64,
    poller: Mutex<Option<Poller>>,
}

/// Cheap to clone; all clones drive the same engine. When the last clone is
/// dropped the polling timer is released.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn AnalyticsSource>, interval: Duration) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            inner: Arc::new(EngineInner {
                source,
                interval,
                state,
                next_seq: AtomicU64::new(0),
                poller: Mutex::new(None),
            }),
        }
    }

    /// Fetch immediately, then every `interval` until [`stop`](Self::stop).
    ///
    /// Returns `false` without doing anything if the engine is already polling.
    pub fn start(&self) -> bool {
        let mut poller = self
            .inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if poller.as_ref().is_some_and(|p| !p.0.is_finished()) {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        *poller = Some(Poller(tokio::spawn(poll_loop(weak, interval))));

        tracing::info!("Analytics polling started (every {:?})", interval);
        true
    }

    /// Cancel the timer. In-flight fetches still complete and update state.
    pub fn stop(&self) {
        let stopped = self
            .inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if stopped.is_some() {
            tracing::info!("Analytics polling stopped");
        }
    }

    /// Out-of-band fetch, identical in effect to a timer tick. Does not wait
    /// for or cancel any fetch already in flight.
    pub fn refresh_now(&self) -> JoinHandle<bool> {
        let engine = self.clone();
        tokio::spawn(async move { engine.fetch_once().await })
    }

    /// Issue one fetch and fold its result into the state. Returns whether
    /// the observable state changed.
    pub async fn fetch_once(&self) -> bool {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.inner.source.fetch_analytics().await;
        self.inner
            .state
            .send_if_modified(|state| state.apply(seq, outcome))
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    /// Copy of the current state.
    pub fn current(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }
}

impl RefreshTrigger for SyncEngine {
    fn refresh_now(&self) {
        SyncEngine::refresh_now(self);
    }
}

async fn poll_loop(weak: Weak<EngineInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately, which gives the initial load.
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let engine = SyncEngine { inner };
        tokio::spawn(async move {
            engine.fetch_once().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    fn row(code: &str, clicks: u64) -> AnalyticsRow {
        AnalyticsRow {
            short_code: code.into(),
            long_url: format!("https://example.com/{code}"),
            click_count: clicks,
        }
    }

    /// Replays scripted outcomes, then repeats the last one.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<Vec<AnalyticsRow>, DashboardError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Vec<AnalyticsRow>, DashboardError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AnalyticsSource for Scripted {
        async fn fetch_analytics(&self) -> Result<Vec<AnalyticsRow>, DashboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                outcomes.front().cloned().unwrap()
            }
        }
    }

    fn network(msg: &str) -> DashboardError {
        DashboardError::NetworkFailure(msg.into())
    }

    #[test]
    fn newer_success_replaces_snapshot() {
        let mut state = SyncState::default();
        assert!(state.apply(1, Ok(vec![row("a", 0)])));
        assert!(state.apply(2, Ok(vec![row("a", 1)])));
        assert_eq!(state.status, SyncStatus::Ready);
        assert_eq!(state.snapshot, vec![row("a", 1)]);
        assert_eq!(state.last_applied, 2);
    }

    #[test]
    fn stale_success_is_ignored() {
        let mut state = SyncState::default();
        assert!(state.apply(2, Ok(vec![row("a", 5)])));
        assert!(!state.apply(1, Ok(vec![row("a", 4)])));
        assert_eq!(state.snapshot, vec![row("a", 5)]);
        assert_eq!(state.last_applied, 2);
    }

    #[test]
    fn first_failure_surfaces_error() {
        let mut state = SyncState::default();
        assert!(state.apply(1, Err(network("connection refused"))));
        assert_eq!(state.status, SyncStatus::Error("connection refused".into()));
        assert!(state.snapshot.is_empty());
        assert!(!state.has_loaded());
    }

    #[test]
    fn failure_after_load_is_swallowed() {
        let mut state = SyncState::default();
        state.apply(1, Ok(vec![row("a", 2)]));
        assert!(!state.apply(2, Err(network("timeout"))));
        assert_eq!(state.status, SyncStatus::Ready);
        assert_eq!(state.snapshot, vec![row("a", 2)]);
    }

    #[test]
    fn success_recovers_from_initial_error() {
        let mut state = SyncState::default();
        state.apply(1, Err(network("down")));
        assert!(state.apply(2, Ok(vec![])));
        assert_eq!(state.status, SyncStatus::Ready);
        assert!(state.has_loaded());
    }

    #[test]
    fn repeated_identical_failure_does_not_notify() {
        let mut state = SyncState::default();
        assert!(state.apply(1, Err(network("down"))));
        assert!(!state.apply(2, Err(network("down"))));
        assert!(state.apply(3, Err(network("still down"))));
    }

    #[tokio::test]
    async fn fetch_once_updates_subscribers() {
        let source = Scripted::new(vec![Ok(vec![row("abc123", 0)])]);
        let engine = SyncEngine::new(source, DEFAULT_POLL_INTERVAL);
        let mut rx = engine.subscribe();

        assert_eq!(rx.borrow().status, SyncStatus::Loading);
        assert!(engine.fetch_once().await);
        assert!(rx.has_changed().unwrap());

        let state = rx.borrow_and_update().clone();
        assert_eq!(state.status, SyncStatus::Ready);
        assert_eq!(state.snapshot, vec![row("abc123", 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_fetches_immediately_then_polls() {
        let source = Scripted::new(vec![Ok(vec![row("a", 0)])]);
        let engine = SyncEngine::new(source.clone(), Duration::from_secs(5));

        assert!(engine.start());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(engine.current().status.is_ready());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let source = Scripted::new(vec![Ok(vec![])]);
        let engine = SyncEngine::new(source.clone(), Duration::from_secs(5));

        assert!(engine.start());
        assert!(!engine.start());
        assert!(!engine.clone().start());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks() {
        let source = Scripted::new(vec![Ok(vec![])]);
        let engine = SyncEngine::new(source.clone(), Duration::from_secs(5));

        engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.stop();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Restartable after a stop.
        assert!(engine.start());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_engine_releases_the_timer() {
        let source = Scripted::new(vec![Ok(vec![])]);
        let engine = SyncEngine::new(source.clone(), Duration::from_secs(5));
        engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(engine);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_now_applies_fresh_rows() {
        let source = Scripted::new(vec![Ok(vec![row("a", 0)]), Ok(vec![row("a", 1)])]);
        let engine = SyncEngine::new(source, DEFAULT_POLL_INTERVAL);

        assert!(engine.refresh_now().await.unwrap());
        assert_eq!(engine.current().snapshot[0].click_count, 0);
        assert!(engine.refresh_now().await.unwrap());
        assert_eq!(engine.current().snapshot[0].click_count, 1);
    }
}
