//! Route playback engine: replays the points of one trip over a timer.

use serde::Serialize;
use model::TrajectoryPoint;

pub mod clock;
pub mod progress;
pub mod speed;
pub mod state;

pub use clock::{PlaybackClock, Subscription};
pub use progress::{progress_percent, project, Progress};
pub use speed::{interval_for_slider, SpeedBand, SpeedControl};
pub use state::{ClockState, PlaybackState, Tick};

/// Read state published to observers after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    /// Increases with every published change; later snapshots win.
    pub revision: u64,
    pub cursor_index: usize,
    pub current_point: Option<TrajectoryPoint>,
    pub progress_percent: f64,
    pub is_playing: bool,
    pub total_points: usize,
    pub interval_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback clock needs a running tokio runtime")]
    NoRuntime,
    #[error("invalid speed range {min}..={max} ms")]
    InvalidSpeedRange { min: u64, max: u64 },
}

/// Anything that wants to hear about clock changes.
pub trait PlaybackObserver: Send + Sync {
    fn on_change(&self, snapshot: &PlaybackSnapshot);
}

impl<F> PlaybackObserver for F
where
    F: Fn(&PlaybackSnapshot) + Send + Sync,
{
    fn on_change(&self, snapshot: &PlaybackSnapshot) {
        self(snapshot)
    }
}

pub type SnapshotTx = crossbeam_channel::Sender<PlaybackSnapshot>;
pub type SnapshotRx = crossbeam_channel::Receiver<PlaybackSnapshot>;

/// Forwards snapshots into a channel; a closed receiver is ignored.
pub struct ChannelObserver(pub SnapshotTx);

impl PlaybackObserver for ChannelObserver {
    fn on_change(&self, snapshot: &PlaybackSnapshot) {
        let _ = self.0.send(snapshot.clone());
    }
}

pub fn channel() -> (SnapshotTx, SnapshotRx) {
    crossbeam_channel::unbounded()
}
