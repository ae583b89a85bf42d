use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::Utc;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    error::{DeliveryError, FocusError},
    hooks::{run_hooks, FocusHook, FocusSession, FocusStarted},
    intervals::{FocusInterval, IntervalTracker},
    messages::{remaining_seconds, FocusSnapshot},
    notify::{BroadcastReport, NotificationHub},
    scheduler::ExpiryScheduler,
    stats::DailyCounter,
};

/// Everything guarded by the state lock: intervals, the expiry timer, the
/// transition timestamp and the hook list.
struct FocusState {
    tracker: IntervalTracker,
    scheduler: ExpiryScheduler,
    last_change: Instant,
    hooks: Vec<Arc<dyn FocusHook>>,
    staged_seq: u64,
}

/// Snapshot numbered in the order it was taken under the state lock.
#[derive(Debug, Clone, Copy)]
struct StagedSnapshot {
    seq: u64,
    snapshot: FocusSnapshot,
}

struct ControllerInner {
    state: Mutex<FocusState>,
    counter: Arc<dyn DailyCounter>,
    hub: NotificationHub,
    /// Highest sequence number handed to the hub.
    delivered_seq: Mutex<u64>,
}

/// Single serialization point for focus-state mutation.
///
/// Cloning is cheap and every clone drives the same state. Broadcasts and
/// hooks always run on spawned tasks after the state lock is released.
/// Snapshots reach the hub in the order they were taken; one that loses the
/// race to a newer snapshot is dropped, so connections always end on the
/// latest state.
#[derive(Clone)]
pub struct FocusController {
    inner: Arc<ControllerInner>,
}

impl FocusController {
    pub fn new(counter: Arc<dyn DailyCounter>, hub: NotificationHub) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(FocusState {
                    tracker: IntervalTracker::new(),
                    scheduler: ExpiryScheduler::new(),
                    last_change: Instant::now(),
                    hooks: Vec::new(),
                    staged_seq: 0,
                }),
                counter,
                hub,
                delivered_seq: Mutex::new(0),
            }),
        }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.inner.hub
    }

    pub async fn register_hook(&self, hook: Arc<dyn FocusHook>) {
        info!(event = "hook_registered", hook = hook.name());
        self.inner.state.lock().await.hooks.push(hook);
    }

    pub async fn start_focus(&self, duration: Duration) -> Result<FocusSnapshot, FocusError> {
        let (staged, started, hooks) = {
            let mut state = self.inner.state.lock().await;
            let now = Instant::now();
            state.tracker.sweep(now);
            let was_focusing = state.tracker.is_focusing(now);
            let interval = state.tracker.add_interval(duration, now)?;
            if !was_focusing {
                state.last_change = now;
            }
            self.inner.counter.increment();
            self.inner.rearm_expiry(&mut state, now);

            let staged = self.inner.stage(&mut state, now);
            let started = FocusStarted {
                session: wall_clock_session(&interval, now),
                snapshot: staged.snapshot,
            };
            (staged, started, state.hooks.clone())
        };

        info!(
            event = "focus_started",
            duration_secs = duration.as_secs(),
            extended = started.snapshot.focus_time_left > duration,
            time_left_secs = remaining_seconds(started.snapshot.focus_time_left),
            sessions_today = started.snapshot.sessions_today
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.publish_logged(staged).await;
            run_hooks(&hooks, &started).await;
        });

        Ok(started.snapshot)
    }

    /// Ends focusing immediately, discarding intervals that have not ended yet.
    pub async fn stop_focus(&self) -> FocusSnapshot {
        let (staged, discarded) = {
            let mut state = self.inner.state.lock().await;
            let now = Instant::now();
            let discarded = state.tracker.clear();
            state.scheduler.cancel();
            state.last_change = now;
            (self.inner.stage(&mut state, now), discarded)
        };

        info!(event = "focus_stopped", discarded);
        self.inner.spawn_publish(staged);
        staged.snapshot
    }

    pub async fn snapshot(&self) -> FocusSnapshot {
        let mut state = self.inner.state.lock().await;
        let now = Instant::now();
        state.tracker.sweep(now);
        self.inner.snapshot_at(&state, now)
    }

    pub async fn time_left(&self) -> Duration {
        let state = self.inner.state.lock().await;
        state.tracker.time_left(Instant::now())
    }

    pub async fn active_intervals(&self) -> Vec<FocusInterval> {
        let mut state = self.inner.state.lock().await;
        state.tracker.sweep(Instant::now());
        state.tracker.intervals().to_vec()
    }

    /// Pushes the current snapshot to every live connection. Reports nothing
    /// delivered when a newer snapshot went out first.
    pub async fn broadcast_snapshot(&self) -> Result<BroadcastReport, DeliveryError> {
        let staged = {
            let mut state = self.inner.state.lock().await;
            let now = Instant::now();
            state.tracker.sweep(now);
            self.inner.stage(&mut state, now)
        };
        self.inner.publish(staged).await
    }
}

impl ControllerInner {
    fn snapshot_at(&self, state: &FocusState, now: Instant) -> FocusSnapshot {
        let focus_time_left = state.tracker.time_left(now);
        FocusSnapshot {
            focusing: !focus_time_left.is_zero(),
            since_last_change: now.saturating_duration_since(state.last_change),
            focus_time_left,
            sessions_today: self.counter.today(),
        }
    }

    fn stage(&self, state: &mut FocusState, now: Instant) -> StagedSnapshot {
        state.staged_seq += 1;
        StagedSnapshot {
            seq: state.staged_seq,
            snapshot: self.snapshot_at(state, now),
        }
    }

    async fn publish(&self, staged: StagedSnapshot) -> Result<BroadcastReport, DeliveryError> {
        let mut delivered_seq = self.delivered_seq.lock().await;
        if staged.seq <= *delivered_seq {
            debug!(
                event = "broadcast_superseded",
                seq = staged.seq,
                delivered_seq = *delivered_seq
            );
            return Ok(BroadcastReport::default());
        }
        *delivered_seq = staged.seq;
        self.hub.broadcast(&staged.snapshot.to_message()).await
    }

    async fn publish_logged(&self, staged: StagedSnapshot) {
        if let Err(err) = self.publish(staged).await {
            warn!(event = "broadcast_error", error = %err);
        }
    }

    fn spawn_publish(self: &Arc<Self>, staged: StagedSnapshot) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.publish_logged(staged).await;
        });
    }

    /// Must run inside the same lock acquisition as the mutation it follows.
    fn rearm_expiry(self: &Arc<Self>, state: &mut FocusState, now: Instant) {
        let deadline = state.tracker.latest_end().filter(|end| *end > now);
        let controller = Arc::downgrade(self);
        state
            .scheduler
            .reschedule(deadline, move |generation| expire(controller, generation));
    }

    async fn on_expiry(self: Arc<Self>, generation: u64) {
        let staged = {
            let mut state = self.state.lock().await;
            if !state.scheduler.complete(generation) {
                debug!(event = "expiry_stale", generation);
                return;
            }
            let now = Instant::now();
            let swept = state.tracker.sweep(now);
            if !state.tracker.is_empty() {
                self.rearm_expiry(&mut state, now);
                info!(
                    event = "expiry_rearmed",
                    swept,
                    remaining = state.tracker.len(),
                    time_left_secs = remaining_seconds(state.tracker.time_left(now))
                );
                return;
            }
            state.last_change = now;
            self.stage(&mut state, now)
        };

        info!(
            event = "focus_expired",
            sessions_today = staged.snapshot.sessions_today
        );
        self.publish_logged(staged).await;
    }
}

async fn expire(controller: Weak<ControllerInner>, generation: u64) {
    if let Some(inner) = controller.upgrade() {
        inner.on_expiry(generation).await;
    }
}

fn wall_clock_session(interval: &FocusInterval, now: Instant) -> FocusSession {
    let ahead = interval.start.saturating_duration_since(now);
    let wall_now = Utc::now();
    let started_at = chrono::Duration::from_std(ahead)
        .ok()
        .and_then(|ahead| wall_now.checked_add_signed(ahead))
        .unwrap_or(wall_now);
    FocusSession {
        started_at,
        duration: interval.duration(),
    }
}
