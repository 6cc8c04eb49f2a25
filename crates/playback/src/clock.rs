use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use model::Trajectory;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, Duration, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::progress::project;
use crate::state::{ClockState, PlaybackState, Tick};
use crate::{PlaybackError, PlaybackObserver, PlaybackSnapshot};

/// A live repeating timer. Dropping it cancels the task.
struct Timer {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Inner {
    state: PlaybackState,
    timer: Option<Timer>,
    generation: u64,
    revision: u64,
}

struct Shared {
    trajectory: Trajectory,
    runtime: Handle,
    inner: Mutex<Inner>,
    observers: Mutex<Vec<(u64, Arc<dyn PlaybackObserver>)>>,
    next_observer: AtomicU64,
}

/// Timer-driven cursor over a trip's points.
///
/// At most one timer task exists per clock; it only holds a weak reference
/// back, and every transition out of `Running` (including dropping the
/// clock) cancels it.
pub struct PlaybackClock {
    shared: Arc<Shared>,
}

/// Observer registration. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.observers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl PlaybackClock {
    /// Uses the runtime of the calling context for the timer.
    pub fn new(trajectory: Trajectory, interval_ms: u64) -> Result<Self, PlaybackError> {
        let runtime = Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;
        Ok(Self::with_runtime(runtime, trajectory, interval_ms))
    }

    pub fn with_runtime(runtime: Handle, trajectory: Trajectory, interval_ms: u64) -> Self {
        let state = PlaybackState::new(trajectory.len(), interval_ms);
        debug!(points = trajectory.len(), interval_ms = state.interval_ms(), "playback clock created");
        Self {
            shared: Arc::new(Shared {
                trajectory,
                runtime,
                inner: Mutex::new(Inner { state, timer: None, generation: 0, revision: 0 }),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
            }),
        }
    }

    pub fn play(&self) {
        self.apply("play", PlaybackState::play);
    }

    pub fn pause(&self) {
        self.apply("pause", PlaybackState::pause);
    }

    pub fn reset(&self) {
        self.apply("reset", PlaybackState::reset);
    }

    pub fn seek(&self, index: usize) {
        self.apply("seek", |s| s.seek(index));
    }

    /// Seek to the last point captured at or before `t`.
    pub fn seek_to_time(&self, t: OffsetDateTime) {
        if let Some(index) = self.shared.trajectory.index_at_or_before(t) {
            self.seek(index);
        }
    }

    /// Restarts a running timer at the new period.
    pub fn set_interval_ms(&self, ms: u64) {
        self.apply("set_interval", |s| s.set_interval_ms(ms));
    }

    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: PlaybackObserver + 'static,
    {
        let id = self.shared.next_observer.fetch_add(1, Ordering::Relaxed);
        self.shared.observers.lock().push((id, Arc::new(observer)));
        Subscription { id, shared: Arc::downgrade(&self.shared) }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let inner = self.shared.inner.lock();
        self.shared.snapshot_of(&inner)
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.shared.trajectory
    }

    pub fn cursor_index(&self) -> usize {
        self.shared.inner.lock().state.cursor_index()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.inner.lock().state.is_playing()
    }

    pub fn clock_state(&self) -> ClockState {
        self.shared.inner.lock().state.clock_state()
    }

    pub fn interval_ms(&self) -> u64 {
        self.shared.inner.lock().state.interval_ms()
    }

    pub fn total_points(&self) -> usize {
        self.shared.trajectory.len()
    }

    pub fn progress_percent(&self) -> f64 {
        project(&self.shared.trajectory, self.cursor_index()).percent
    }

    fn apply(&self, op: &'static str, f: impl FnOnce(&mut PlaybackState) -> bool) {
        let snapshot = {
            let mut inner = self.shared.inner.lock();
            let was_playing = inner.state.is_playing();
            let old_interval = inner.state.interval_ms();
            if !f(&mut inner.state) {
                trace!(op, "no-op");
                return;
            }
            if !inner.state.is_playing() {
                inner.timer = None;
            } else if !was_playing || inner.state.interval_ms() != old_interval {
                start_timer(&self.shared, &mut inner);
            }
            inner.revision += 1;
            debug!(
                op,
                cursor = inner.state.cursor_index(),
                playing = inner.state.is_playing(),
                interval_ms = inner.state.interval_ms(),
                "playback state changed"
            );
            self.shared.snapshot_of(&inner)
        };
        self.shared.notify(&snapshot);
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        if self.shared.inner.lock().timer.take().is_some() {
            debug!("playback clock dropped while running; timer cancelled");
        }
    }
}

impl Shared {
    fn snapshot_of(&self, inner: &Inner) -> PlaybackSnapshot {
        let cursor = inner.state.cursor_index();
        let progress = project(&self.trajectory, cursor);
        PlaybackSnapshot {
            revision: inner.revision,
            cursor_index: cursor,
            current_point: progress.current_point.cloned(),
            progress_percent: progress.percent,
            is_playing: inner.state.is_playing(),
            total_points: self.trajectory.len(),
            interval_ms: inner.state.interval_ms(),
        }
    }

    fn notify(&self, snapshot: &PlaybackSnapshot) {
        // clone out so observers run without the lock and may call back in
        let observers: Vec<_> = self.observers.lock().iter().map(|(_, o)| o.clone()).collect();
        for o in observers {
            o.on_change(snapshot);
        }
    }

    /// Returns false once this timer generation should stop.
    fn on_tick(&self, generation: u64) -> bool {
        let (snapshot, keep_going) = {
            let mut inner = self.inner.lock();
            if inner.timer.as_ref().map(|t| t.generation) != Some(generation) {
                return false;
            }
            let keep_going = match inner.state.tick() {
                Tick::Ignored => return false,
                Tick::Advanced => true,
                Tick::Finished => {
                    debug!(cursor = inner.state.cursor_index(), "playback reached last point");
                    inner.timer = None;
                    false
                }
            };
            inner.revision += 1;
            (self.snapshot_of(&inner), keep_going)
        };
        self.notify(&snapshot);
        keep_going
    }
}

fn start_timer(shared: &Arc<Shared>, inner: &mut Inner) {
    inner.generation += 1;
    let generation = inner.generation;
    let period = Duration::from_millis(inner.state.interval_ms());
    let first = Instant::now() + period;
    let weak = Arc::downgrade(shared);
    let task = shared.runtime.spawn(run_timer(weak, generation, first, period));
    // replacing the old handle cancels it
    inner.timer = Some(Timer { generation, task });
}

async fn run_timer(shared: Weak<Shared>, generation: u64, first: Instant, period: Duration) {
    let mut ticker = tokio_time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else { break };
        if !shared.on_tick(generation) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel, ChannelObserver};
    use model::TrajectoryPoint;
    use std::sync::atomic::AtomicUsize;
    use time::macros::datetime;

    fn trajectory(n: usize) -> Trajectory {
        (0..n)
            .map(|i| TrajectoryPoint {
                latitude: -23.5 - i as f64 * 0.001,
                longitude: -46.6,
                captured_at: datetime!(2024-03-01 08:00 UTC) + time::Duration::seconds(10 * i as i64),
                note: None,
            })
            .collect::<Vec<_>>()
            .into()
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn test_new_outside_runtime() {
        assert!(matches!(
            PlaybackClock::new(trajectory(3), 100),
            Err(PlaybackError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_points_finish_after_four_intervals() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        clock.play();
        assert_eq!(clock.clock_state(), ClockState::Running);
        sleep_ms(450).await;
        assert_eq!(clock.cursor_index(), 4);
        assert_eq!(clock.progress_percent(), 100.0);
        assert_eq!(clock.clock_state(), ClockState::Idle);

        // no loop
        sleep_ms(1000).await;
        assert_eq!(clock.cursor_index(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_increases_by_fixed_step() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        let (tx, rx) = channel();
        let _sub = clock.subscribe(ChannelObserver(tx));
        clock.play();
        sleep_ms(450).await;
        let percents: Vec<f64> = rx.try_iter().map(|s| s.progress_percent).collect();
        assert_eq!(percents, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        clock.play();
        sleep_ms(250).await;
        clock.pause();
        assert_eq!(clock.cursor_index(), 2);
        sleep_ms(500).await;
        assert_eq!(clock.cursor_index(), 2);
        clock.play();
        assert_eq!(clock.cursor_index(), 2);
        sleep_ms(150).await;
        assert_eq!(clock.cursor_index(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_timer() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        clock.play();
        sleep_ms(250).await;
        clock.reset();
        assert_eq!(clock.cursor_index(), 0);
        assert_eq!(clock.clock_state(), ClockState::Idle);
        sleep_ms(500).await;
        assert_eq!(clock.cursor_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_after_completion_replays() {
        let clock = PlaybackClock::new(trajectory(3), 100).unwrap();
        clock.play();
        sleep_ms(300).await;
        assert_eq!(clock.cursor_index(), 2);
        clock.play();
        assert_eq!(clock.cursor_index(), 0);
        assert!(clock.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_keeps_running_state() {
        let clock = PlaybackClock::new(trajectory(10), 100).unwrap();
        clock.seek(7);
        assert_eq!(clock.cursor_index(), 7);
        assert!(!clock.is_playing());
        clock.seek(10);
        assert_eq!(clock.cursor_index(), 7);

        clock.play();
        clock.seek(2);
        assert!(clock.is_playing());
        sleep_ms(150).await;
        assert_eq!(clock.cursor_index(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_to_time() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        clock.seek_to_time(datetime!(2024-03-01 08:00:25 UTC));
        assert_eq!(clock.cursor_index(), 2);
        clock.seek_to_time(datetime!(2024-03-01 07:00 UTC));
        assert_eq!(clock.cursor_index(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_timer() {
        let clock = PlaybackClock::new(trajectory(20), 100).unwrap();
        clock.play();
        sleep_ms(150).await;
        assert_eq!(clock.cursor_index(), 1);
        clock.set_interval_ms(500);
        sleep_ms(450).await;
        assert_eq!(clock.cursor_index(), 1);
        sleep_ms(100).await;
        assert_eq!(clock.cursor_index(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_trajectory_is_inert() {
        let clock = PlaybackClock::new(trajectory(0), 100).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = clock.subscribe(move |_: &PlaybackSnapshot| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        clock.play();
        clock.pause();
        clock.seek(2);
        sleep_ms(500).await;
        let snap = clock.snapshot();
        assert!(snap.current_point.is_none());
        assert_eq!(snap.progress_percent, 0.0);
        assert!(!snap.is_playing);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_point() {
        let clock = PlaybackClock::new(trajectory(1), 100).unwrap();
        clock.play();
        sleep_ms(150).await;
        let snap = clock.snapshot();
        assert_eq!(snap.progress_percent, 0.0);
        assert_eq!(snap.current_point.as_ref(), clock.trajectory().get(0));
        assert!(!snap.is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_matches_projection() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        for i in 0..5 {
            clock.seek(i);
            let snap = clock.snapshot();
            let expected = project(clock.trajectory(), i);
            assert_eq!(snap.progress_percent, expected.percent);
            assert_eq!(snap.current_point.as_ref(), expected.current_point);
            assert_eq!(clock.progress_percent(), expected.percent);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_subscription_stops_notifications() {
        let clock = PlaybackClock::new(trajectory(5), 100).unwrap();
        let (tx, rx) = channel();
        let sub = clock.subscribe(ChannelObserver(tx));
        clock.seek(1);
        drop(sub);
        clock.seek(2);
        let cursors: Vec<usize> = rx.try_iter().map(|s| s.cursor_index).collect();
        assert_eq!(cursors, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let trajectory = trajectory(50);
        let clock = PlaybackClock::new(trajectory, 100).unwrap();
        let weak = Arc::downgrade(&clock.shared);
        clock.play();
        sleep_ms(150).await;
        drop(clock);
        sleep_ms(500).await;
        assert!(weak.upgrade().is_none());
    }
}
