use serde::{Deserialize, Serialize};

/// Smallest timer period accepted by the clock.
pub const MIN_INTERVAL_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    Idle,
    Running,
}

/// What a timer tick did to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running; the tick was stale.
    Ignored,
    /// Cursor moved forward and playback continues.
    Advanced,
    /// Playback reached the last point and went idle.
    Finished,
}

/// Cursor state machine behind [`crate::PlaybackClock`].
///
/// Holds no timer itself. Every method returns whether the state changed so
/// the owner knows when to start or stop its timer and notify observers.
/// With zero points every operation is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    cursor_index: usize,
    is_playing: bool,
    interval_ms: u64,
    total_points: usize,
}

impl PlaybackState {
    pub fn new(total_points: usize, interval_ms: u64) -> Self {
        Self {
            cursor_index: 0,
            is_playing: false,
            interval_ms: interval_ms.max(MIN_INTERVAL_MS),
            total_points,
        }
    }

    pub fn cursor_index(&self) -> usize { self.cursor_index }
    pub fn is_playing(&self) -> bool { self.is_playing }
    pub fn interval_ms(&self) -> u64 { self.interval_ms }
    pub fn total_points(&self) -> usize { self.total_points }

    pub fn clock_state(&self) -> ClockState {
        if self.is_playing { ClockState::Running } else { ClockState::Idle }
    }

    fn last_index(&self) -> usize {
        self.total_points.saturating_sub(1)
    }

    fn at_end(&self) -> bool {
        self.cursor_index >= self.last_index()
    }

    /// Enter `Running`. Playing from the last point restarts at 0.
    /// Returns true when a timer must be started.
    pub fn play(&mut self) -> bool {
        if self.total_points == 0 || self.is_playing {
            return false;
        }
        if self.at_end() {
            self.cursor_index = 0;
        }
        self.is_playing = true;
        true
    }

    /// Returns true when the clock left `Running`.
    pub fn pause(&mut self) -> bool {
        std::mem::replace(&mut self.is_playing, false)
    }

    /// Back to `Idle` at cursor 0. Returns true if anything changed.
    pub fn reset(&mut self) -> bool {
        if self.total_points == 0 {
            return false;
        }
        let changed = self.is_playing || self.cursor_index != 0;
        self.is_playing = false;
        self.cursor_index = 0;
        changed
    }

    /// Out-of-range indices are ignored. Running state is left alone.
    pub fn seek(&mut self, index: usize) -> bool {
        if index >= self.total_points || index == self.cursor_index {
            return false;
        }
        self.cursor_index = index;
        true
    }

    /// Clamped to [`MIN_INTERVAL_MS`]. Returns true if the period changed.
    pub fn set_interval_ms(&mut self, ms: u64) -> bool {
        let ms = ms.max(MIN_INTERVAL_MS);
        if ms == self.interval_ms {
            return false;
        }
        self.interval_ms = ms;
        true
    }

    pub fn tick(&mut self) -> Tick {
        if !self.is_playing {
            return Tick::Ignored;
        }
        if self.at_end() {
            self.is_playing = false;
            return Tick::Finished;
        }
        self.cursor_index += 1;
        if self.at_end() {
            self.is_playing = false;
            Tick::Finished
        } else {
            Tick::Advanced
        }
    }
}
