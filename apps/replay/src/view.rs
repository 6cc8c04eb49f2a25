use model::LatLng;
use tracing::info;
use trip_map::{MapView, Marker, MarkerId};

/// Headless map backend: every draw call becomes a log line.
#[derive(Default)]
pub struct LogView {
    pub moves: usize,
}

impl MapView for LogView {
    fn draw_polyline(&mut self, points: &[LatLng]) {
        info!(target: "map", points = points.len(), "route polyline");
    }

    fn place_marker(&mut self, id: MarkerId, marker: &Marker) {
        info!(
            target: "map",
            id = id.0,
            kind = ?marker.kind,
            lat = marker.position.latitude,
            lng = marker.position.longitude,
            "{}",
            marker.label
        );
    }

    fn move_marker(&mut self, id: MarkerId, to: LatLng) {
        self.moves += 1;
        info!(target: "map", id = id.0, lat = to.latitude, lng = to.longitude, "marker moved");
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        info!(target: "map", lat = center.latitude, lng = center.longitude, zoom, "view");
    }

    fn show_placeholder(&mut self, message: &str) {
        info!(target: "map", "{}", message);
    }
}
