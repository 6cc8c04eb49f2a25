use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoValue};
use model::*;
use serde::Serialize;
use serde_json::json;

mod renderer;

pub use renderer::{MapRenderer, MapView, CURRENT_MARKER, EMPTY_TRIP_MESSAGE};

/// Zoom used when the view is reset; close enough to read street names.
pub const DEFAULT_ZOOM: u8 = 15;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Start,
    End,
    Current,
    Incident,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkerId(pub usize);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: LatLng,
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// Static layers of one trip, computed once before playback.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripMap {
    pub polyline: Vec<LatLng>,
    pub start: Option<Marker>,
    pub end: Option<Marker>,
    pub incidents: Vec<Marker>,
    pub center: Option<LatLng>,
    pub bbox: Option<BBox>,
    pub zoom: u8,
}

impl TripMap {
    pub fn is_empty(&self) -> bool {
        self.polyline.is_empty()
    }

    /// Markers that never move, with the ids the renderer places them under.
    pub fn static_markers(&self) -> Vec<(MarkerId, &Marker)> {
        let mut out = Vec::with_capacity(self.incidents.len() + 2);
        if let Some(m) = &self.start {
            out.push((MarkerId(1), m));
        }
        if let Some(m) = &self.end {
            out.push((MarkerId(2), m));
        }
        for (i, m) in self.incidents.iter().enumerate() {
            out.push((MarkerId(3 + i), m));
        }
        out
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.incidents.len() + 3);
        if !self.polyline.is_empty() {
            let line = self.polyline.iter().map(|p| vec![p.longitude, p.latitude]).collect();
            features.push(feature(GeoValue::LineString(line), json!({ "kind": "route" })));
        }
        for (_, m) in self.static_markers() {
            features.push(feature(
                GeoValue::Point(vec![m.position.longitude, m.position.latitude]),
                json!({ "kind": m.kind, "label": m.label }),
            ));
        }
        FeatureCollection { bbox: None, features, foreign_members: None }
    }
}

fn feature(value: GeoValue, props: serde_json::Value) -> Feature {
    let properties: Option<JsonObject> = match props {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties,
        foreign_members: None,
    }
}

pub fn build_trip_map(trip: &Trip, zoom: u8) -> TripMap {
    let polyline: Vec<LatLng> = trip.points.iter().map(TrajectoryPoint::position).collect();

    let start = trip.points.first().map(|p| Marker {
        kind: MarkerKind::Start,
        position: p.position(),
        label: "Start".into(),
    });
    let end = trip.points.last().map(|p| Marker {
        kind: MarkerKind::End,
        position: p.position(),
        label: "End".into(),
    });

    // incidents without coordinates stay in the list view only
    let incidents = trip
        .incidents
        .iter()
        .filter_map(|i| {
            i.coordinates.map(|c| Marker {
                kind: MarkerKind::Incident,
                position: c,
                label: i.name.clone(),
            })
        })
        .collect();

    TripMap {
        center: centroid_of(&polyline),
        bbox: bbox_of(&polyline),
        polyline,
        start,
        end,
        incidents,
        zoom,
    }
}

fn centroid_of(pl: &[LatLng]) -> Option<LatLng> {
    if pl.is_empty() {
        return None;
    }
    let n = pl.len() as f64;
    let (lat, lng) = pl
        .iter()
        .fold((0.0, 0.0), |(a, b), p| (a + p.latitude, b + p.longitude));
    Some(LatLng::new(lat / n, lng / n))
}

fn bbox_of(pl: &[LatLng]) -> Option<BBox> {
    if pl.is_empty() {
        return None;
    }
    let mut b = BBox {
        min_lat: f64::INFINITY,
        max_lat: f64::NEG_INFINITY,
        min_lng: f64::INFINITY,
        max_lng: f64::NEG_INFINITY,
    };
    for p in pl {
        b.min_lat = b.min_lat.min(p.latitude);
        b.max_lat = b.max_lat.max(p.latitude);
        b.min_lng = b.min_lng.min(p.longitude);
        b.max_lng = b.max_lng.max(p.longitude);
    }
    Some(b)
}

/// Great-circle distance in meters.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let (la1, la2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = la2 - la1;
    let dlng = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + la1.cos() * la2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripSummary {
    pub points: usize,
    pub incidents: usize,
    pub duration_s: Option<i64>,
    pub distance_m: f64,
}

pub fn trip_summary(trip: &Trip) -> TripSummary {
    let distance_m = trip
        .points
        .points()
        .windows(2)
        .map(|w| haversine_m(w[0].position(), w[1].position()))
        .sum();
    TripSummary {
        points: trip.points.len(),
        incidents: trip.incidents.len(),
        duration_s: trip.duration().map(|d| d.whole_seconds()),
        distance_m,
    }
}
