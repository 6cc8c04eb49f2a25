use std::sync::Arc;

use model::LatLng;
use parking_lot::Mutex;
use playback::{PlaybackClock, PlaybackSnapshot, Subscription};
use tracing::{debug, trace};

use crate::{Marker, MarkerId, MarkerKind, TripMap};

/// The one marker that moves during playback.
pub const CURRENT_MARKER: MarkerId = MarkerId(0);

pub const EMPTY_TRIP_MESSAGE: &str = "No route points recorded for this trip";

/// Drawing backend the renderer talks to.
pub trait MapView: Send + 'static {
    fn draw_polyline(&mut self, points: &[LatLng]);
    fn place_marker(&mut self, id: MarkerId, marker: &Marker);
    fn move_marker(&mut self, id: MarkerId, to: LatLng);
    fn set_view(&mut self, center: LatLng, zoom: u8);
    fn show_placeholder(&mut self, message: &str);
}

struct Canvas<V> {
    view: V,
    drawn_cursor: Option<usize>,
    drawn_revision: u64,
}

impl<V: MapView> Canvas<V> {
    fn follow(&mut self, snapshot: &PlaybackSnapshot) {
        if snapshot.revision < self.drawn_revision {
            trace!(revision = snapshot.revision, "stale snapshot skipped");
            return;
        }
        self.drawn_revision = snapshot.revision;
        if self.drawn_cursor == Some(snapshot.cursor_index) {
            return;
        }
        if let Some(p) = &snapshot.current_point {
            self.view.move_marker(CURRENT_MARKER, p.position());
            self.drawn_cursor = Some(snapshot.cursor_index);
        }
    }
}

/// Keeps a [`MapView`] in step with a [`PlaybackClock`].
///
/// Static layers are drawn once on attach; afterwards only the current
/// position marker moves. Dropping the renderer unsubscribes it.
pub struct MapRenderer<V: MapView> {
    map: TripMap,
    canvas: Arc<Mutex<Canvas<V>>>,
    _subscription: Option<Subscription>,
}

impl<V: MapView> MapRenderer<V> {
    pub fn attach(map: TripMap, view: V, clock: &PlaybackClock) -> Self {
        let mut canvas = Canvas { view, drawn_cursor: None, drawn_revision: 0 };

        let center = if map.is_empty() { None } else { map.center };
        let Some(center) = center else {
            debug!("trip has no points; drawing placeholder");
            canvas.view.show_placeholder(EMPTY_TRIP_MESSAGE);
            return Self { map, canvas: Arc::new(Mutex::new(canvas)), _subscription: None };
        };

        canvas.view.draw_polyline(&map.polyline);
        for (id, marker) in map.static_markers() {
            canvas.view.place_marker(id, marker);
        }
        canvas.view.set_view(center, map.zoom);

        // subscribe before reading the clock: a change racing with the
        // initial placement waits on the canvas lock and is then applied or
        // dropped by revision
        let canvas = Arc::new(Mutex::new(canvas));
        let mut drawing = canvas.lock();
        let follower = canvas.clone();
        let subscription = clock.subscribe(move |s: &PlaybackSnapshot| follower.lock().follow(s));

        let snapshot = clock.snapshot();
        if let Some(p) = &snapshot.current_point {
            let marker = Marker {
                kind: MarkerKind::Current,
                position: p.position(),
                label: "Truck".into(),
            };
            drawing.view.place_marker(CURRENT_MARKER, &marker);
            drawing.drawn_cursor = Some(snapshot.cursor_index);
        }
        drawing.drawn_revision = snapshot.revision;
        drop(drawing);
        debug!(
            points = map.polyline.len(),
            incidents = map.incidents.len(),
            "map layers drawn"
        );

        Self { map, canvas, _subscription: Some(subscription) }
    }

    /// Recentre on the trip, whatever the playback position.
    pub fn reset_view(&self) {
        if let Some(center) = self.map.center {
            self.canvas.lock().view.set_view(center, self.map.zoom);
        }
    }

    pub fn map(&self) -> &TripMap {
        &self.map
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.canvas.lock().view)
    }
}
