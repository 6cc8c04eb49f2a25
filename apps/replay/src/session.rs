use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::info;

use model::Trip;
use playback::{PlaybackClock, PlaybackSnapshot, SpeedControl};
use trip_map::{build_trip_map, trip_summary, MapRenderer, TripMap, TripSummary};

use crate::config::ReplayConfig;
use crate::view::LogView;

/// One trip open for playback: the clock, its map and the speed slider.
pub struct AppSession {
    pub trip: Trip,
    // declared before the clock so it unsubscribes first
    pub renderer: MapRenderer<LogView>,
    pub clock: PlaybackClock,
    pub speed: Mutex<SpeedControl>,
}

impl AppSession {
    pub fn new(trip: Trip, cfg: &ReplayConfig) -> Result<Self> {
        let speed = SpeedControl::new(cfg.slider_min, cfg.slider_max)?.with_interval(cfg.interval_ms);
        let clock = PlaybackClock::new(trip.points.clone(), speed.interval_ms())?;
        let renderer = MapRenderer::attach(build_trip_map(&trip, cfg.zoom), LogView::default(), &clock);
        info!(
            trip = %trip.id,
            name = %trip.name,
            points = trip.points.len(),
            interval_ms = speed.interval_ms(),
            "session opened"
        );
        Ok(Self { trip, renderer, clock, speed: Mutex::new(speed) })
    }

    pub fn map(&self) -> &TripMap {
        self.renderer.map()
    }

    pub fn summary(&self) -> TripSummary {
        trip_summary(&self.trip)
    }

    /// False while playing; the slider is read-only then.
    pub fn set_speed(&self, slider: u64) -> bool {
        self.speed.lock().set(slider, &self.clock)
    }

    /// Play from the current cursor and wait for the last point or Ctrl-C.
    pub async fn run_to_end(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = self.clock.subscribe(move |s: &PlaybackSnapshot| {
            let _ = tx.send((s.is_playing, s.cursor_index));
        });
        self.clock.play();
        if !self.clock.is_playing() {
            info!("nothing to play");
            return Ok(());
        }
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                Some((playing, cursor)) = rx.recv() => {
                    if !playing {
                        info!(cursor, "playback finished");
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    self.clock.pause();
                    info!(cursor = self.clock.cursor_index(), "playback interrupted");
                    break;
                }
            }
        }
        Ok(())
    }
}
