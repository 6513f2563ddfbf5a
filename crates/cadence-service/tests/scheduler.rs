//! Scheduler behaviour with a manual clock. Tests that run a slow build use
//! real tokio time, since blocking tasks hold back paused-time auto-advance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_core::clock::{Clock, ManualClock};
use cadence_core::config::ExpansionConfig;
use cadence_core::types::UntilBoundary;
use cadence_rfc::rfc::ical::expand::TimeZoneResolver;
use cadence_rfc::rfc::ical::parse::{EventRecord, TimeProperty};
use cadence_service::calendar::SelectionFilter;
use cadence_service::countdown::{CountdownSnapshot, Urgency};
use cadence_service::error::SourceError;
use cadence_service::refresh::{
    BackoffPolicy, DualCadenceScheduler, EventSource, RefreshPipeline, RefreshState,
    SchedulerConfig, SchedulerHandle, SourceBatch, TickPolicy,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tokio::sync::watch;

#[derive(Default)]
struct Script {
    records: Mutex<Vec<EventRecord>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    calls: AtomicUsize,
}

/// A source whose behaviour the test flips while the scheduler runs.
#[derive(Clone, Default)]
struct ScriptedSource(Arc<Script>);

impl ScriptedSource {
    fn with_records(records: Vec<EventRecord>) -> Self {
        let source = Self::default();
        *source.0.records.lock().unwrap() = records;
        source
    }

    fn set_failing(&self, failing: bool) {
        self.0.failing.store(failing, Ordering::SeqCst);
    }

    fn set_hanging(&self, hanging: bool) {
        self.0.hanging.store(hanging, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }
}

impl EventSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<SourceBatch>, SourceError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        if self.0.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable {
                id: "work".to_string(),
                reason: "offline".to_string(),
            });
        }
        let records = self.0.records.lock().unwrap().clone();
        Ok(vec![SourceBatch::new("work", records)])
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, 9, 50, 0).unwrap()
}

fn meeting_at_ten() -> EventRecord {
    EventRecord {
        uid: "review".to_string(),
        dtstart: Some(TimeProperty::new("20260112T100000Z")),
        duration: Some("PT30M".to_string()),
        summary: Some("Review".to_string()),
        ..EventRecord::default()
    }
}

fn spawn(source: &ScriptedSource, clock: &ManualClock) -> SchedulerHandle {
    spawn_with(
        source,
        clock,
        SelectionFilter::new(),
        Duration::from_secs(5),
        Duration::from_secs(45),
    )
}

fn spawn_with(
    source: &ScriptedSource,
    clock: &ManualClock,
    filter: SelectionFilter,
    tick_period: Duration,
    refresh_timeout: Duration,
) -> SchedulerHandle {
    let pipeline = RefreshPipeline::new(
        TimeZoneResolver::new(),
        ExpansionConfig {
            max_instances: 1000,
            window_days: 730,
            lookback_hours: 24,
            until_boundary: UntilBoundary::Inclusive,
        },
        filter,
    );
    let config = SchedulerConfig {
        tick_period,
        refresh_timeout,
        backoff: BackoffPolicy::new(
            Duration::from_secs(60),
            Duration::ZERO,
            [60, 120, 300, 600].map(Duration::from_secs).to_vec(),
        ),
        tick_policy: TickPolicy::default(),
    };
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    DualCadenceScheduler::new(source.clone(), pipeline, clock, config).spawn()
}

/// Admits everything, but each call blocks its thread for `delay`.
fn slow_filter(delay: Duration, entered: Arc<AtomicBool>) -> SelectionFilter {
    SelectionFilter::new().with_predicate(move |_| {
        entered.store(true, Ordering::SeqCst);
        std::thread::sleep(delay);
        false
    })
}

async fn snapshot_where(
    rx: &mut watch::Receiver<Arc<CountdownSnapshot>>,
    predicate: impl FnMut(&Arc<CountdownSnapshot>) -> bool,
) -> Arc<CountdownSnapshot> {
    Arc::clone(&*rx.wait_for(predicate).await.unwrap())
}

async fn state_where(
    rx: &mut watch::Receiver<Arc<RefreshState>>,
    predicate: impl FnMut(&Arc<RefreshState>) -> bool,
) -> Arc<RefreshState> {
    Arc::clone(&*rx.wait_for(predicate).await.unwrap())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_first_refresh_publishes_selection() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    let clock = ManualClock::new(start());
    let handle = spawn(&source, &clock);
    let mut snapshots = handle.snapshots();

    let snapshot = snapshot_where(&mut snapshots, |s| s.next.is_some()).await;

    assert_eq!(snapshot.urgency, Urgency::Tight);
    assert_eq!(snapshot.gap_seconds, Some(600));
    assert!(!snapshot.stale);
    assert_eq!(snapshot.data_age_seconds, Some(0));
    assert_eq!(snapshot.error, None);

    handle.stop().await;
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_fast_tick_follows_clock_without_fetching() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    let clock = ManualClock::new(start());
    let handle = spawn(&source, &clock);
    let mut snapshots = handle.snapshots();
    snapshot_where(&mut snapshots, |s| s.next.is_some()).await;
    let calls = source.calls();

    clock.advance(TimeDelta::minutes(6));
    let snapshot = snapshot_where(&mut snapshots, |s| s.urgency == Urgency::Critical).await;

    assert_eq!(snapshot.gap_seconds, Some(240));
    assert_eq!(source.calls(), calls);

    handle.stop().await;
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_failures_keep_timeline_and_surface_only_when_sustained() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    let clock = ManualClock::new(start());
    let handle = spawn(&source, &clock);
    let mut states = handle.states();
    let mut snapshots = handle.snapshots();
    state_where(&mut states, |s| s.fetched_at.is_some()).await;

    source.set_failing(true);
    let failed = state_where(&mut states, |s| s.consecutive_failures == 1).await;
    assert_eq!(failed.fetched_at, Some(start()));
    assert_eq!(failed.timeline.len(), 1);
    assert!(failed.selection.next.is_some());

    let snapshot = handle.latest_snapshot();
    assert_eq!(snapshot.error, None);
    assert!(snapshot.next.is_some());

    clock.advance(TimeDelta::minutes(16));
    let surfaced = snapshot_where(&mut snapshots, |s| s.error.is_some()).await;
    assert!(surfaced.stale);
    assert!(surfaced.error.as_deref().unwrap().contains("offline"));
    assert!(surfaced.next.is_some());

    source.set_failing(false);
    let recovered = state_where(&mut states, |s| s.consecutive_failures == 0).await;
    assert!(recovered.fetched_at > Some(start()));
    let cleared = snapshot_where(&mut snapshots, |s| s.error.is_none()).await;
    assert!(!cleared.stale);

    handle.stop().await;
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_timeout_counts_as_failure() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    source.set_hanging(true);
    let clock = ManualClock::new(start());
    let handle = spawn(&source, &clock);
    let mut states = handle.states();

    let failed = state_where(&mut states, |s| s.consecutive_failures == 1).await;

    assert!(
        failed
            .last_error
            .as_deref()
            .unwrap()
            .contains("timed out after 45s")
    );
    assert!(failed.fetched_at.is_none());

    handle.stop().await;
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_stop_abandons_in_flight_fetch() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    source.set_hanging(true);
    let clock = ManualClock::new(start());
    let handle = spawn(&source, &clock);
    let states = handle.states();

    while source.calls() == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::timeout(Duration::from_secs(1), handle.stop())
        .await
        .expect("stop should not wait for the fetch");

    tokio::time::advance(Duration::from_secs(600)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(states.borrow().consecutive_failures, 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_consecutive_failures_follow_backoff_steps() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    source.set_failing(true);
    let clock = ManualClock::new(start());
    let handle = spawn(&source, &clock);
    let mut states = handle.states();

    state_where(&mut states, |s| s.consecutive_failures == 1).await;
    assert_eq!(source.calls(), 1);

    // First retry 60s after the first failure.
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(source.calls(), 1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(states.borrow().consecutive_failures, 2);

    // Second retry 120s after that.
    tokio::time::sleep(Duration::from_secs(117)).await;
    assert_eq!(source.calls(), 2);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(states.borrow().consecutive_failures, 3);

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_slow_build_times_out() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    let clock = ManualClock::new(start());
    let entered = Arc::new(AtomicBool::new(false));
    let handle = spawn_with(
        &source,
        &clock,
        slow_filter(Duration::from_millis(300), Arc::clone(&entered)),
        Duration::from_secs(5),
        Duration::from_millis(100),
    );
    let mut states = handle.states();

    let failed = tokio::time::timeout(
        Duration::from_secs(5),
        state_where(&mut states, |s| s.consecutive_failures == 1),
    )
    .await
    .expect("refresh should time out while the build is running");

    assert!(entered.load(Ordering::SeqCst));
    assert!(failed.last_error.as_deref().unwrap().contains("timed out"));
    assert!(failed.fetched_at.is_none());
    assert!(failed.selection.next.is_none());
    assert_eq!(source.calls(), 1);

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_stop_and_ticks_do_not_wait_for_build() {
    let source = ScriptedSource::with_records(vec![meeting_at_ten()]);
    let clock = ManualClock::new(start());
    let entered = Arc::new(AtomicBool::new(false));
    let handle = spawn_with(
        &source,
        &clock,
        slow_filter(Duration::from_millis(800), Arc::clone(&entered)),
        Duration::from_millis(20),
        Duration::from_secs(45),
    );
    let states = handle.states();
    let mut snapshots = handle.snapshots();

    while !entered.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for _ in 0..3 {
        tokio::time::timeout(Duration::from_millis(500), snapshots.changed())
            .await
            .expect("fast cycle should tick during the build")
            .unwrap();
    }
    tokio::time::timeout(Duration::from_millis(500), handle.stop())
        .await
        .expect("stop should not wait for the build");

    // The abandoned build finishes on its own thread and publishes nothing.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let state = states.borrow();
    assert!(state.fetched_at.is_none());
    assert_eq!(state.consecutive_failures, 0);
}
