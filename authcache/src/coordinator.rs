//! Freshness coordinator
//!
//! Owns the current [`Snapshot`] and decides whether readers get it right
//! away, wait for the first push, or fail stale.
//!
//! ```text
//! never-fresh --push--------------> fresh (forever)
//! never-fresh --deadline----------> stale-timeout --push--> fresh
//! ```
//!
//! The deadline is armed once, at construction, with the configured grace
//! period. Every transition happens under one mutex, so a push processed
//! before the deadline turns the later firing into a no-op.

use crate::snapshot::Snapshot;
use authcache_core::StaleError;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type ReadOutcome = Result<Arc<Snapshot>, StaleError>;

/// Observable freshness state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No snapshot yet and the grace period is still running
    NeverFresh,
    /// A snapshot has been pushed
    Fresh,
    /// The grace period ran out before any snapshot arrived
    StaleTimeout,
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Freshness::NeverFresh => write!(f, "never-fresh"),
            Freshness::Fresh => write!(f, "fresh"),
            Freshness::StaleTimeout => write!(f, "stale-timeout"),
        }
    }
}

enum State {
    NeverFresh,
    Fresh(Arc<Snapshot>),
    StaleTimeout,
}

struct Inner {
    state: State,
    last_failure: Option<String>,
    deadline: Instant,
    waiters: Vec<oneshot::Sender<ReadOutcome>>,
}

impl Inner {
    fn freshness(&self) -> Freshness {
        match self.state {
            State::NeverFresh => Freshness::NeverFresh,
            State::Fresh(_) => Freshness::Fresh,
            State::StaleTimeout => Freshness::StaleTimeout,
        }
    }

    fn stale_error(&self) -> StaleError {
        StaleError::new(self.last_failure.clone())
    }

    /// Outcome for a reader arriving now; `None` means it has to wait
    fn current(&self) -> Option<ReadOutcome> {
        match &self.state {
            State::Fresh(snapshot) => Some(Ok(Arc::clone(snapshot))),
            State::StaleTimeout => Some(Err(self.stale_error())),
            State::NeverFresh => None,
        }
    }

    fn expire_if_due(&mut self, now: Instant) {
        if now >= self.deadline {
            self.expire();
        }
    }

    /// Deadline firing; only acts while still never-fresh
    fn expire(&mut self) {
        if !matches!(self.state, State::NeverFresh) {
            return;
        }

        self.state = State::StaleTimeout;
        let error = self.stale_error();
        let released = self.waiters.len();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }

        warn!(
            released_readers = released,
            reason = %error,
            "Grace period expired before the first auth database snapshot"
        );
    }
}

/// Process-lifetime owner of the current auth database snapshot.
///
/// Blocked readers are released at the deadline even when the coordinator was
/// built outside a Tokio runtime and no timer task could be spawned.
pub struct Coordinator {
    inner: Arc<Mutex<Inner>>,
    grace_period: Duration,
}

impl Coordinator {
    pub fn new(grace_period: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(grace_period)
            .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 3600));

        let inner = Arc::new(Mutex::new(Inner {
            state: State::NeverFresh,
            last_failure: None,
            deadline,
            waiters: Vec::new(),
        }));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let timer = Arc::downgrade(&inner);
                handle.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    if let Some(inner) = timer.upgrade() {
                        lock(&inner).expire();
                    }
                });
            }
            Err(_) => {
                debug!("No Tokio runtime; grace period is enforced by readers");
            }
        }

        Self {
            inner,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Install a new snapshot and release every blocked reader with it
    pub fn push(&self, snapshot: impl Into<Arc<Snapshot>>) {
        let snapshot = snapshot.into();
        let mut inner = lock(&self.inner);

        let previous = inner.freshness();
        inner.state = State::Fresh(Arc::clone(&snapshot));

        let released = inner.waiters.len();
        for waiter in inner.waiters.drain(..) {
            let _ = waiter.send(Ok(Arc::clone(&snapshot)));
        }

        if previous == Freshness::Fresh {
            debug!(released_readers = released, "Auth database snapshot replaced");
        } else {
            info!(
                previous = %previous,
                released_readers = released,
                "Auth database is fresh"
            );
        }
    }

    /// Record why the update feed failed; used only in later stale errors
    pub fn push_failure(&self, reason: impl Display) {
        let reason = reason.to_string();
        warn!(reason = %reason, "Auth database update failed");
        lock(&self.inner).last_failure = Some(reason);
    }

    /// Current snapshot, waiting for the first push while the grace period runs.
    ///
    /// A reader released by the deadline stays failed even if a push lands
    /// right after; the next call sees the new state.
    pub async fn read(&self) -> Result<Arc<Snapshot>, StaleError> {
        let (receiver, deadline) = {
            let mut inner = lock(&self.inner);
            inner.expire_if_due(Instant::now());
            if let Some(outcome) = inner.current() {
                return outcome;
            }

            let (sender, receiver) = oneshot::channel();
            inner.waiters.retain(|waiter| !waiter.is_closed());
            inner.waiters.push(sender);
            (receiver, inner.deadline)
        };

        debug!("Waiting for the first auth database snapshot");
        match tokio::time::timeout_at(deadline, receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Only reachable if the coordinator was dropped mid-wait
            Ok(Err(_)) => Err(StaleError::default()),
            Err(_) => {
                // No timer task got there first; fire the deadline here. A push
                // that already landed still wins.
                let mut inner = lock(&self.inner);
                inner.expire();
                inner
                    .current()
                    .unwrap_or_else(|| Err(inner.stale_error()))
            }
        }
    }

    /// Non-blocking read; a never-fresh coordinator reports stale
    pub fn try_read(&self) -> Result<Arc<Snapshot>, StaleError> {
        let mut inner = lock(&self.inner);
        inner.expire_if_due(Instant::now());
        inner
            .current()
            .unwrap_or_else(|| Err(inner.stale_error()))
    }

    pub fn freshness(&self) -> Freshness {
        let mut inner = lock(&self.inner);
        inner.expire_if_due(Instant::now());
        inner.freshness()
    }

    pub fn last_failure(&self) -> Option<String> {
        lock(&self.inner).last_failure.clone()
    }

    /// Readers currently blocked waiting for the first snapshot
    pub fn waiting_readers(&self) -> usize {
        lock(&self.inner)
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Coordinator")
            .field("freshness", &inner.freshness())
            .field("last_failure", &inner.last_failure)
            .field("waiters", &inner.waiters.len())
            .field("grace_period", &self.grace_period)
            .finish()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // State stays consistent across a panicking holder: every transition is
    // a single assignment followed by draining the waiters.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Bucket;

    fn snapshot_with_bucket(name: &str) -> Snapshot {
        Snapshot::builder().bucket(Bucket::new(name, "")).build()
    }

    async fn wait_for_readers(coordinator: &Coordinator, count: usize) {
        while coordinator.waiting_readers() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_zero_grace_period_is_stale_immediately() {
        let coordinator = Coordinator::new(Duration::ZERO);

        let err = coordinator.read().await.unwrap_err();
        assert_eq!(err, StaleError::default());
        assert_eq!(coordinator.freshness(), Freshness::StaleTimeout);
        assert!(coordinator.try_read().is_err());
    }

    #[test]
    fn test_works_without_runtime() {
        let coordinator = Coordinator::new(Duration::ZERO);
        assert_eq!(coordinator.freshness(), Freshness::StaleTimeout);

        coordinator.push(snapshot_with_bucket("default"));
        assert!(coordinator.try_read().is_ok());
    }

    fn current_thread_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_deadline_releases_reader_when_built_without_runtime() {
        let coordinator = Coordinator::new(Duration::from_millis(50));
        let runtime = current_thread_runtime();

        let outcome = runtime.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), coordinator.read()).await
        });

        let err = outcome
            .expect("reader must be released by the grace period")
            .unwrap_err();
        assert_eq!(err, StaleError::default());
        assert_eq!(coordinator.freshness(), Freshness::StaleTimeout);
        assert_eq!(coordinator.waiting_readers(), 0);
    }

    #[test]
    fn test_push_releases_reader_when_built_without_runtime() {
        let coordinator = Arc::new(Coordinator::new(Duration::from_secs(60)));
        let runtime = current_thread_runtime();

        runtime.block_on(async {
            let reader = {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.read().await })
            };
            wait_for_readers(&coordinator, 1).await;
            coordinator.push(snapshot_with_bucket("default"));

            let snapshot = reader.await.unwrap().unwrap();
            assert!(snapshot.bucket("default").is_some());
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_releases_blocked_readers() {
        let coordinator = Arc::new(Coordinator::new(Duration::from_secs(60)));
        assert_eq!(coordinator.freshness(), Freshness::NeverFresh);

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.read().await })
            })
            .collect();

        wait_for_readers(&coordinator, 3).await;
        coordinator.push(snapshot_with_bucket("default"));

        for reader in readers {
            let snapshot = reader.await.unwrap().unwrap();
            assert!(snapshot.bucket("default").is_some());
        }
        assert_eq!(coordinator.freshness(), Freshness::Fresh);
        assert_eq!(coordinator.waiting_readers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_releases_blocked_readers_with_reason() {
        let coordinator = Arc::new(Coordinator::new(Duration::from_secs(10)));
        coordinator.push_failure("Need 200 status!. Got 401");

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.read().await })
            })
            .collect();

        // Both readers block; paused time advances to the deadline once idle
        for reader in readers {
            let err = reader.await.unwrap().unwrap_err();
            assert_eq!(
                err.last_reason.as_deref(),
                Some("Need 200 status!. Got 401")
            );
        }
        assert_eq!(coordinator.freshness(), Freshness::StaleTimeout);

        // Later reads fail without blocking
        let err = coordinator.read().await.unwrap_err();
        assert!(err.to_string().contains("Need 200 status!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_after_deadline_recovers() {
        let coordinator = Arc::new(Coordinator::new(Duration::from_secs(5)));

        let reader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.read().await })
        };
        let released = reader.await.unwrap();
        assert!(released.is_err());

        coordinator.push(snapshot_with_bucket("default"));

        // The released reader is not revisited; new reads see the snapshot
        assert!(released.is_err());
        let snapshot = coordinator.read().await.unwrap();
        assert!(snapshot.bucket("default").is_some());
        assert_eq!(coordinator.freshness(), Freshness::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_never_reverts() {
        let coordinator = Coordinator::new(Duration::from_secs(5));
        coordinator.push(snapshot_with_bucket("first"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(coordinator.freshness(), Freshness::Fresh);

        coordinator.push(snapshot_with_bucket("second"));
        let snapshot = coordinator.read().await.unwrap();
        assert!(snapshot.bucket("first").is_none());
        assert!(snapshot.bucket("second").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_failure_does_not_release_readers() {
        let coordinator = Arc::new(Coordinator::new(Duration::from_secs(60)));

        let reader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.read().await })
        };
        wait_for_readers(&coordinator, 1).await;

        coordinator.push_failure("connection refused");
        tokio::task::yield_now().await;
        assert_eq!(coordinator.waiting_readers(), 1);
        assert_eq!(coordinator.freshness(), Freshness::NeverFresh);
        assert_eq!(
            coordinator.last_failure().as_deref(),
            Some("connection refused")
        );

        coordinator.push(snapshot_with_bucket("default"));
        assert!(reader.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_reader_does_not_block_others() {
        let coordinator = Arc::new(Coordinator::new(Duration::from_secs(60)));

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), coordinator.read()).await;
        assert!(abandoned.is_err());
        assert_eq!(coordinator.waiting_readers(), 0);
        assert_eq!(coordinator.freshness(), Freshness::NeverFresh);

        let reader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.read().await })
        };
        wait_for_readers(&coordinator, 1).await;
        coordinator.push(snapshot_with_bucket("default"));
        assert!(reader.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_try_read_never_blocks() {
        let coordinator = Coordinator::new(Duration::from_secs(3600));
        assert_eq!(coordinator.try_read().unwrap_err(), StaleError::default());
        assert_eq!(coordinator.freshness(), Freshness::NeverFresh);

        coordinator.push(snapshot_with_bucket("default"));
        assert!(coordinator.try_read().is_ok());
    }
}
