//! Circuit breaker for the guarded operation.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: testing if the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first call after open_duration has elapsed
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails (open_duration restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per guarded operation, shared by all callers through `Arc`
//! - Every read-modify-write happens under a single mutex; events are
//!   emitted after it is released
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open; concurrent callers are rejected
//! - Only the trial's outcome moves the breaker out of Half-Open; late
//!   outcomes of calls admitted while Closed are ignored

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::resilience::clock::Clock;
use crate::resilience::error::ResilienceError;
use crate::resilience::events::{EventListener, ResilienceEvent};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Breaker tuning, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures (while Closed) that open the breaker. At least 1.
    pub failure_threshold: u32,
    /// How long the breaker stays Open before allowing a trial.
    pub open_duration: Duration,
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_transition: DateTime<Utc>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    last_transition: DateTime<Utc>,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.consecutive_failures = 0;
        self.trial_in_flight = false;
        self.opened_at = (to == CircuitState::Open).then_some(now);
        self.last_transition = Utc::now();
    }
}

/// Three-state gate in front of the guarded operation.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventListener>,
}

/// Admission to run the operation once.
///
/// Dropping an unsettled trial permit frees the half-open slot so the next
/// caller can take over the trial.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut inner = self.breaker.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.trial_in_flight = false;
            }
            tracing::debug!("Half-open trial abandoned, releasing trial slot");
        }
    }
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    ///
    /// A `failure_threshold` of 0 is treated as 1.
    pub fn new(
        settings: BreakerSettings,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventListener>,
    ) -> Self {
        let settings = BreakerSettings {
            failure_threshold: settings.failure_threshold.max(1),
            ..settings
        };
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
                last_transition: Utc::now(),
            }),
            clock,
            events,
        }
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    /// Current view of the breaker, exactly as stored.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_transition: inner.last_transition,
        }
    }

    /// State the next call would observe, without changing anything.
    ///
    /// An Open breaker whose open duration has elapsed reports HalfOpen.
    pub fn effective_state(&self) -> CircuitState {
        let inner = self.lock();
        self.project(&inner)
    }

    /// Effective state and the time of the last transition, read together.
    pub fn health_view(&self) -> (CircuitState, DateTime<Utc>) {
        let inner = self.lock();
        (self.project(&inner), inner.last_transition)
    }

    fn project(&self, inner: &BreakerInner) -> CircuitState {
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at))
                if self.clock.now().saturating_duration_since(opened_at)
                    >= self.settings.open_duration =>
            {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        }
    }

    /// Run `operation` under breaker protection.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.call_unless_abandoned(operation, &CancellationToken::new())
            .await
    }

    /// Like [`call`](Self::call), but once `abandoned` is cancelled the
    /// outcome of the in-flight call is not recorded and the call reports
    /// [`ResilienceError::Cancelled`], so retry layers above stop quietly.
    pub(crate) async fn call_unless_abandoned<T, E, F, Fut>(
        &self,
        operation: F,
        abandoned: &CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut permit = self.acquire()?;
        let outcome = operation().await;

        if abandoned.is_cancelled() {
            tracing::debug!(succeeded = outcome.is_ok(), "Discarding outcome of abandoned call");
            return Err(ResilienceError::Cancelled);
        }

        match outcome {
            Ok(value) => {
                self.on_success(&mut permit);
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&mut permit, &e.to_string());
                Err(ResilienceError::Operation(e))
            }
        }
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        let now = self.clock.now();
        let changed = {
            let mut inner = self.lock();
            let changed = inner.state != CircuitState::Closed;
            inner.transition(CircuitState::Closed, now);
            changed
        };
        if changed {
            self.events.on_event(&ResilienceEvent::BreakerReset);
        }
    }

    /// Force the breaker Open, starting a fresh open duration.
    pub fn trip(&self, reason: &str) {
        let now = self.clock.now();
        self.lock().transition(CircuitState::Open, now);
        self.events.on_event(&ResilienceEvent::BreakerOpened {
            open_duration: self.settings.open_duration,
            reason: reason.to_string(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire<E>(&self) -> Result<Permit<'_>, ResilienceError<E>> {
        let now = self.clock.now();
        let mut half_opened = false;

        let admitted = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => Ok(false),
                CircuitState::Open => {
                    let opened_at = inner.opened_at.unwrap_or(now);
                    let elapsed = now.saturating_duration_since(opened_at);
                    if elapsed < self.settings.open_duration {
                        Err(ResilienceError::CircuitOpen {
                            retry_after: self.settings.open_duration - elapsed,
                        })
                    } else {
                        inner.transition(CircuitState::HalfOpen, now);
                        inner.trial_in_flight = true;
                        half_opened = true;
                        Ok(true)
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.trial_in_flight {
                        Err(ResilienceError::CircuitOpen {
                            retry_after: Duration::ZERO,
                        })
                    } else {
                        inner.trial_in_flight = true;
                        Ok(true)
                    }
                }
            }
        };

        if half_opened {
            self.events.on_event(&ResilienceEvent::BreakerHalfOpen);
        }

        admitted.map(|trial| Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn on_success(&self, permit: &mut Permit<'_>) {
        permit.settled = true;
        let now = self.clock.now();
        let reset = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                    false
                }
                CircuitState::HalfOpen if permit.trial => {
                    inner.transition(CircuitState::Closed, now);
                    true
                }
                _ => false,
            }
        };
        if reset {
            self.events.on_event(&ResilienceEvent::BreakerReset);
        }
    }

    fn on_failure(&self, permit: &mut Permit<'_>, reason: &str) {
        permit.settled = true;
        let now = self.clock.now();
        let opened = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.settings.failure_threshold {
                        inner.transition(CircuitState::Open, now);
                        true
                    } else {
                        false
                    }
                }
                CircuitState::HalfOpen if permit.trial => {
                    inner.transition(CircuitState::Open, now);
                    true
                }
                _ => false,
            }
        };
        if opened {
            self.events.on_event(&ResilienceEvent::BreakerOpened {
                open_duration: self.settings.open_duration,
                reason: reason.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::TokioClock;
    use crate::resilience::events::testing::RecordingListener;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{advance, sleep};

    fn breaker(threshold: u32, open_ms: u64) -> (CircuitBreaker, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let breaker = CircuitBreaker::new(
            BreakerSettings {
                failure_threshold: threshold,
                open_duration: Duration::from_millis(open_ms),
            },
            Arc::new(TokioClock),
            listener.clone(),
        );
        (breaker, listener)
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), ResilienceError<String>> {
        breaker
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("db down".to_string())
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), ResilienceError<String>> {
        breaker
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_exactly_at_threshold() {
        let (cb, listener) = breaker(3, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        fail(&cb, &calls).await.unwrap_err();
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 2);

        let err = fail(&cb, &calls).await.unwrap_err();
        assert_eq!(err, ResilienceError::Operation("db down".to_string()));
        assert_eq!(cb.snapshot().state, CircuitState::Open);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        assert_eq!(
            listener.events(),
            vec![ResilienceEvent::BreakerOpened {
                open_duration: Duration::from_millis(1000),
                reason: "db down".into(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let (cb, _) = breaker(3, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        fail(&cb, &calls).await.unwrap_err();
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.snapshot().consecutive_failures, 0);

        fail(&cb, &calls).await.unwrap_err();
        fail(&cb, &calls).await.unwrap_err();
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_fails_fast_without_invoking() {
        let (cb, _) = breaker(1, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        advance(Duration::from_millis(400)).await;

        for _ in 0..5 {
            let err = succeed(&cb, &calls).await.unwrap_err();
            assert_eq!(
                err,
                ResilienceError::CircuitOpen {
                    retry_after: Duration::from_millis(600)
                }
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_success_closes() {
        let (cb, listener) = breaker(1, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        advance(Duration::from_millis(1000)).await;
        assert_eq!(cb.effective_state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().state, CircuitState::Open);

        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let events = listener.events();
        assert_eq!(events[1], ResilienceEvent::BreakerHalfOpen);
        assert_eq!(events[2], ResilienceEvent::BreakerReset);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_failure_reopens_and_restarts_timer() {
        let (cb, _) = breaker(1, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        advance(Duration::from_millis(1000)).await;
        fail(&cb, &calls).await.unwrap_err();
        assert_eq!(cb.snapshot().state, CircuitState::Open);

        advance(Duration::from_millis(999)).await;
        assert!(succeed(&cb, &calls).await.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        advance(Duration::from_millis(1)).await;
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_under_concurrency() {
        let (cb, _) = breaker(1, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        advance(Duration::from_millis(1000)).await;

        let counter = &calls;
        let slow_trial = cb.call(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(100)).await;
            Ok::<(), String>(())
        });
        let second = succeed(&cb, &calls);

        let (trial, second) = tokio::join!(slow_trial, second);
        assert!(trial.is_ok());
        assert_eq!(
            second.unwrap_err(),
            ResilienceError::CircuitOpen { retry_after: Duration::ZERO }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_releases_slot() {
        let (cb, _) = breaker(1, 1000);
        let calls = AtomicU32::new(0);

        fail(&cb, &calls).await.unwrap_err();
        advance(Duration::from_millis(1000)).await;

        let hung = cb.call(|| async {
            sleep(Duration::from_secs(3600)).await;
            Ok::<(), String>(())
        });
        let timed = tokio::time::timeout(Duration::from_millis(10), hung).await;
        assert!(timed.is_err());
        assert_eq!(cb.snapshot().state, CircuitState::HalfOpen);

        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_outcome_not_recorded() {
        let (cb, _) = breaker(1, 1000);
        let abandoned = CancellationToken::new();
        abandoned.cancel();

        let result = cb
            .call_unless_abandoned(|| async { Err::<(), _>("late".to_string()) }, &abandoned)
            .await;
        assert_eq!(result, Err(ResilienceError::Cancelled));
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trip_and_reset() {
        let (cb, listener) = breaker(5, 1000);
        cb.trip("maintenance");
        assert_eq!(cb.snapshot().state, CircuitState::Open);
        cb.reset();
        assert_eq!(cb.snapshot().state, CircuitState::Closed);
        assert_eq!(listener.events().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_open_once() {
        let (cb, listener) = breaker(4, 60_000);
        let cb = Arc::new(cb);
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cb = cb.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    cb.call(move || async move {
                        // Every call is admitted before any of them fails.
                        barrier.wait().await;
                        Err::<(), _>("db down".to_string())
                    })
                    .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_err());
        }

        let opened = listener
            .events()
            .into_iter()
            .filter(|e| matches!(e, ResilienceEvent::BreakerOpened { .. }))
            .count();
        assert_eq!(opened, 1);
        assert_eq!(cb.snapshot().state, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_view_matches_snapshot() {
        let (cb, _) = breaker(1, 1000);
        let calls = AtomicU32::new(0);
        fail(&cb, &calls).await.unwrap_err();

        let (state, since) = cb.health_view();
        assert_eq!(state, CircuitState::Open);
        assert_eq!(since, cb.snapshot().last_transition);

        advance(Duration::from_millis(1000)).await;
        assert_eq!(cb.health_view().0, CircuitState::HalfOpen);
    }

    #[test]
    fn test_zero_threshold_treated_as_one() {
        let (cb, _) = breaker(0, 1000);
        assert_eq!(cb.settings().failure_threshold, 1);
    }
}
