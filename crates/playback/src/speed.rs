//! Slider-facing playback speed.
//!
//! The slider reads "higher is faster" while the clock only knows a timer
//! period, so the value is inverted here and nowhere else.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{PlaybackClock, PlaybackError};

pub const DEFAULT_SLIDER_MIN: u64 = 100;
pub const DEFAULT_SLIDER_MAX: u64 = 2000;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
/// Longest interval a slider may produce: one hour per point.
pub const MAX_SLIDER_MS: u64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedBand {
    Slow,
    Normal,
    Fast,
}

impl SpeedBand {
    pub fn label(self) -> &'static str {
        match self {
            SpeedBand::Slow => "Slow",
            SpeedBand::Normal => "Normal",
            SpeedBand::Fast => "Fast",
        }
    }
}

impl std::fmt::Display for SpeedBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `max + min - v`, with `v` clamped into the slider range first. Swapped
/// bounds are read as the same range.
pub fn interval_for_slider(value: u64, min: u64, max: u64) -> u64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    hi.saturating_add(lo) - value.clamp(lo, hi)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedControl {
    min: u64,
    max: u64,
    value: u64,
}

impl SpeedControl {
    pub fn new(min: u64, max: u64) -> Result<Self, PlaybackError> {
        if min == 0 || min >= max || max > MAX_SLIDER_MS {
            return Err(PlaybackError::InvalidSpeedRange { min, max });
        }
        Ok(Self { min, max, value: interval_for_slider(DEFAULT_INTERVAL_MS, min, max) })
    }

    /// Positions the slider so that it produces `interval_ms`.
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.value = interval_for_slider(interval_ms, self.min, self.max);
        self
    }

    pub fn range(&self) -> (u64, u64) {
        (self.min, self.max)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn interval_ms(&self) -> u64 {
        interval_for_slider(self.value, self.min, self.max)
    }

    /// Display band; bands split the interval range into thirds.
    pub fn band(&self) -> SpeedBand {
        let span = self.max.saturating_sub(self.min);
        let offset = self.interval_ms().saturating_sub(self.min).saturating_mul(3);
        if offset >= span.saturating_mul(2) {
            SpeedBand::Slow
        } else if offset <= span {
            SpeedBand::Fast
        } else {
            SpeedBand::Normal
        }
    }

    /// Read-only while the clock is running.
    pub fn is_enabled(&self, clock: &PlaybackClock) -> bool {
        !clock.is_playing()
    }

    /// Moves the slider and retunes the clock. Refused while playing.
    pub fn set(&mut self, value: u64, clock: &PlaybackClock) -> bool {
        if !self.is_enabled(clock) {
            debug!(value, "speed change ignored while playing");
            return false;
        }
        self.value = value.clamp(self.min, self.max);
        clock.set_interval_ms(self.interval_ms());
        true
    }
}

impl Default for SpeedControl {
    fn default() -> Self {
        Self {
            min: DEFAULT_SLIDER_MIN,
            max: DEFAULT_SLIDER_MAX,
            value: interval_for_slider(DEFAULT_INTERVAL_MS, DEFAULT_SLIDER_MIN, DEFAULT_SLIDER_MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Trajectory;

    #[test]
    fn test_inversion() {
        assert_eq!(interval_for_slider(100, 100, 2000), 2000);
        assert_eq!(interval_for_slider(2000, 100, 2000), 100);
        assert_eq!(interval_for_slider(600, 100, 2000), 1500);
        assert_eq!(interval_for_slider(5, 100, 2000), 2000);
        assert_eq!(interval_for_slider(9999, 100, 2000), 100);
    }

    #[test]
    fn test_invalid_range() {
        assert!(SpeedControl::new(0, 100).is_err());
        assert!(SpeedControl::new(500, 500).is_err());
        assert!(SpeedControl::new(100, 400).is_ok());
        assert!(SpeedControl::new(10, u64::MAX).is_err());
        assert!(SpeedControl::new(MAX_SLIDER_MS, MAX_SLIDER_MS + 1).is_err());
        assert!(SpeedControl::new(1, MAX_SLIDER_MS).is_ok());
    }

    #[test]
    fn test_inversion_never_overflows() {
        assert_eq!(interval_for_slider(0, 10, u64::MAX), u64::MAX - 10);
        assert_eq!(interval_for_slider(u64::MAX, u64::MAX, u64::MAX), 0);
        // swapped bounds behave like the ordered range
        assert_eq!(interval_for_slider(600, 2000, 100), 1500);
        assert_eq!(interval_for_slider(5, 2000, 100), 2000);
    }

    #[test]
    fn test_widest_range_bands() {
        let s = SpeedControl::new(1, MAX_SLIDER_MS).unwrap();
        assert_eq!(s.clone().with_interval(MAX_SLIDER_MS).band(), SpeedBand::Slow);
        assert_eq!(s.clone().with_interval(1).band(), SpeedBand::Fast);
    }

    #[test]
    fn test_bands_are_continuous_underneath() {
        let s = SpeedControl::new(100, 400).unwrap();
        assert_eq!(s.clone().with_interval(400).band(), SpeedBand::Slow);
        assert_eq!(s.clone().with_interval(300).band(), SpeedBand::Slow);
        assert_eq!(s.clone().with_interval(250).band(), SpeedBand::Normal);
        assert_eq!(s.clone().with_interval(200).band(), SpeedBand::Fast);
        assert_eq!(s.clone().with_interval(100).band(), SpeedBand::Fast);
        assert_eq!(s.clone().with_interval(251).interval_ms(), 251);
    }

    #[test]
    fn test_default_round_trip() {
        let s = SpeedControl::default();
        assert_eq!(s.interval_ms(), DEFAULT_INTERVAL_MS);
        assert_eq!(s.band(), SpeedBand::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_while_playing() {
        let points: Trajectory = (0..4)
            .map(|i| model::TrajectoryPoint {
                latitude: i as f64,
                longitude: 0.0,
                captured_at: time::macros::datetime!(2024-03-01 08:00 UTC),
                note: None,
            })
            .collect::<Vec<_>>()
            .into();
        let clock = PlaybackClock::new(points, 1000).unwrap();
        let mut speed = SpeedControl::default();

        assert!(speed.set(1900, &clock));
        assert_eq!(clock.interval_ms(), 200);

        clock.play();
        assert!(!speed.is_enabled(&clock));
        assert!(!speed.set(100, &clock));
        assert_eq!(speed.value(), 1900);
        assert_eq!(clock.interval_ms(), 200);

        clock.pause();
        assert!(speed.set(100, &clock));
        assert_eq!(clock.interval_ms(), 2000);
    }
}
