//! Two independent loops sharing one published state.
//!
//! The slow loop fetches and rebuilds the timeline, then replaces the
//! published [`RefreshState`] in a single send. The fast loop only reads the
//! latest published state and the clock, so it never waits on I/O.

use std::sync::Arc;
use std::time::Duration;

use cadence_core::clock::Clock;
use cadence_core::config::Settings;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;

use super::backoff::BackoffPolicy;
use super::pipeline::RefreshPipeline;
use super::source::EventSource;
use super::state::RefreshState;
use crate::countdown::{CountdownSnapshot, UrgencyThresholds, classify_with};
use crate::error::{RefreshFailure, ServiceError, ServiceResult};

/// How a fast tick turns the published state into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPolicy {
    pub thresholds: UrgencyThresholds,
    pub stale_after: TimeDelta,
    pub sustained_failure: TimeDelta,
}

impl TickPolicy {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            thresholds: UrgencyThresholds::from_config(&settings.countdown),
            stale_after: seconds(settings.refresh.stale_after_secs),
            sustained_failure: seconds(settings.refresh.sustained_failure_secs),
        }
    }

    /// ## Summary
    /// Classifies the state's selection at `now` and annotates it with data
    /// age and any sustained refresh error.
    #[must_use]
    pub fn snapshot(&self, state: &RefreshState, now: DateTime<Utc>) -> CountdownSnapshot {
        classify_with(
            &self.thresholds,
            now,
            state.selection.current.as_ref(),
            state.selection.next.as_ref(),
        )
        .with_freshness(state.data_age(now), self.stale_after)
        .with_error(
            state
                .surfaced_error(now, self.sustained_failure)
                .map(str::to_string),
        )
    }
}

impl Default for TickPolicy {
    fn default() -> Self {
        Self {
            thresholds: UrgencyThresholds::default(),
            stale_after: TimeDelta::seconds(180),
            sustained_failure: TimeDelta::minutes(15),
        }
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Timing of both loops.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_period: Duration,
    /// Bound on one fetch+expand+select run.
    pub refresh_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub tick_policy: TickPolicy,
}

impl SchedulerConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tick_period: settings.tick.period(),
            refresh_timeout: settings.refresh.timeout(),
            backoff: BackoffPolicy::from_config(&settings.refresh),
            tick_policy: TickPolicy::from_settings(settings),
        }
    }
}

/// Drives the slow refresh cycle and the fast countdown tick.
pub struct DualCadenceScheduler<S> {
    source: Arc<S>,
    pipeline: RefreshPipeline,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl<S: EventSource + 'static> DualCadenceScheduler<S> {
    #[must_use]
    pub fn new(
        source: S,
        pipeline: RefreshPipeline,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source: Arc::new(source),
            pipeline,
            clock,
            config,
        }
    }

    /// ## Summary
    /// Builds a scheduler from loaded settings.
    ///
    /// ## Errors
    /// Returns an error if the configured assumed zone is unknown.
    pub fn from_settings(
        settings: &Settings,
        source: S,
        clock: Arc<dyn Clock>,
    ) -> ServiceResult<Self> {
        Ok(Self::new(
            source,
            RefreshPipeline::from_settings(settings)?,
            clock,
            SchedulerConfig::from_settings(settings),
        ))
    }

    /// ## Summary
    /// Starts both loops on the current tokio runtime.
    ///
    /// The first refresh starts immediately. Until it succeeds, snapshots
    /// carry no selection and are marked stale.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let Self {
            source,
            pipeline,
            clock,
            config,
        } = self;

        let cancel = CancellationToken::new();
        let initial = RefreshState::default();
        let first_snapshot = config.tick_policy.snapshot(&initial, clock.now());
        let (state_tx, state_rx) = watch::channel(Arc::new(initial));
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(first_snapshot));

        tracing::info!(
            tick_secs = config.tick_period.as_secs(),
            timeout_secs = config.refresh_timeout.as_secs(),
            "starting scheduler"
        );

        let slow = tokio::spawn(
            SlowCycle {
                source,
                pipeline,
                clock: Arc::clone(&clock),
                refresh_timeout: config.refresh_timeout,
                backoff: config.backoff,
                state_tx,
                cancel: cancel.clone(),
            }
            .run(),
        );
        let fast = tokio::spawn(
            FastCycle {
                clock,
                policy: config.tick_policy,
                period: config.tick_period,
                state_rx: state_rx.clone(),
                snapshot_tx,
                cancel: cancel.clone(),
            }
            .run(),
        );

        SchedulerHandle {
            cancel,
            slow,
            fast,
            state_rx,
            snapshot_rx,
        }
    }
}

/// Owner-side handle to a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    slow: JoinHandle<()>,
    fast: JoinHandle<()>,
    state_rx: watch::Receiver<Arc<RefreshState>>,
    snapshot_rx: watch::Receiver<Arc<CountdownSnapshot>>,
}

impl SchedulerHandle {
    /// Receiver of every published snapshot.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Arc<CountdownSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Receiver of every published refresh state.
    #[must_use]
    pub fn states(&self) -> watch::Receiver<Arc<RefreshState>> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn latest_snapshot(&self) -> Arc<CountdownSnapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    /// ## Summary
    /// Stops both loops and waits for them to exit.
    ///
    /// An in-flight fetch or build is abandoned, not awaited.
    pub async fn stop(self) {
        self.cancel.cancel();
        for (name, handle) in [("slow", self.slow), ("fast", self.fast)] {
            if let Err(error) = handle.await {
                tracing::warn!(cycle = name, %error, "scheduler task ended abnormally");
            }
        }
        tracing::info!("scheduler stopped");
    }
}

struct SlowCycle<S> {
    source: Arc<S>,
    pipeline: RefreshPipeline,
    clock: Arc<dyn Clock>,
    refresh_timeout: Duration,
    backoff: BackoffPolicy,
    state_tx: watch::Sender<Arc<RefreshState>>,
    cancel: CancellationToken,
}

impl<S: EventSource> SlowCycle<S> {
    async fn run(mut self) {
        loop {
            let started = self.clock.now();
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = timeout(
                    self.refresh_timeout,
                    self.pipeline.run(self.source.as_ref(), started),
                ) => result,
            };

            let previous = Arc::clone(&self.state_tx.borrow());
            let finished = self.clock.now();
            let next = match result {
                Ok(Ok(outcome)) => previous.succeeded(outcome, finished),
                Ok(Err(error)) => self.failure(&previous, &error, finished),
                Err(_elapsed) => {
                    let error =
                        ServiceError::from(RefreshFailure::Timeout(self.refresh_timeout));
                    self.failure(&previous, &error, finished)
                }
            };

            let delay = self.backoff.next_delay(next.consecutive_failures);
            tracing::debug!(
                failures = next.consecutive_failures,
                delay_secs = delay.as_secs(),
                "next refresh scheduled"
            );
            self.state_tx.send_replace(Arc::new(next));

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = sleep(delay) => {}
            }
        }
        tracing::debug!("slow cycle stopped");
    }

    fn failure(
        &self,
        previous: &RefreshState,
        error: &ServiceError,
        now: DateTime<Utc>,
    ) -> RefreshState {
        let next = previous.failed(error, now);
        tracing::warn!(
            %error,
            attempt = next.consecutive_failures,
            "refresh failed, keeping previous timeline"
        );
        next
    }
}

struct FastCycle {
    clock: Arc<dyn Clock>,
    policy: TickPolicy,
    period: Duration,
    state_rx: watch::Receiver<Arc<RefreshState>>,
    snapshot_tx: watch::Sender<Arc<CountdownSnapshot>>,
    cancel: CancellationToken,
}

impl FastCycle {
    async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut surfaced = false;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }

            let state = Arc::clone(&self.state_rx.borrow_and_update());
            let snapshot = self.policy.snapshot(&state, self.clock.now());

            if snapshot.error.is_some() != surfaced {
                surfaced = snapshot.error.is_some();
                if let Some(error) = &snapshot.error {
                    tracing::info!(%error, "sustained refresh failure surfaced");
                } else {
                    tracing::info!("refresh failure cleared");
                }
            }

            self.snapshot_tx.send_replace(Arc::new(snapshot));
        }
        tracing::debug!("fast cycle stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::calendar::Selection;
    use crate::countdown::Urgency;

    fn at(minute: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 2, 2, 9, minute, 0).unwrap()
    }

    #[test]
    fn test_tick_policy_before_first_refresh() {
        let snapshot = TickPolicy::default().snapshot(&RefreshState::default(), at(0));
        assert_eq!(snapshot.urgency, Urgency::None);
        assert!(snapshot.stale);
        assert_eq!(snapshot.error, None);
    }

    #[test]
    fn test_tick_policy_surfaces_sustained_error_with_stale_data() {
        let ok = RefreshState {
            fetched_at: Some(at(0)),
            selection: Selection::default(),
            ..RefreshState::default()
        };
        let failing = ok.failed(&"offline", at(1));
        let policy = TickPolicy::default();

        let early = policy.snapshot(&failing, at(3));
        assert!(!early.stale);
        assert_eq!(early.error, None);

        let late = policy.snapshot(&failing, at(16));
        assert!(late.stale);
        assert_eq!(late.data_age_seconds, Some(16 * 60));
        assert_eq!(late.error.as_deref(), Some("offline"));
    }

    #[test]
    fn test_seconds_saturates() {
        assert_eq!(seconds(5), TimeDelta::seconds(5));
        assert_eq!(seconds(u64::MAX), TimeDelta::MAX);
    }
}
