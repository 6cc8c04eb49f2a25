//! Trip data shared by the playback engine, the map layers and the loaders.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One GPS sample of a completed trip.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TrajectoryPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TrajectoryPoint {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// The ordered point sequence of one trip.
///
/// Points are expected in ascending `captured_at` order; nothing here sorts
/// them. The slice is shared, so cloning a `Trajectory` never copies points.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(from = "Vec<TrajectoryPoint>", into = "Vec<TrajectoryPoint>")]
pub struct Trajectory {
    points: Arc<[TrajectoryPoint]>,
}

impl Trajectory {
    pub fn new(points: Vec<TrajectoryPoint>) -> Self {
        Self { points: points.into() }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrajectoryPoint> {
        self.points.get(index)
    }

    pub fn first(&self) -> Option<&TrajectoryPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TrajectoryPoint> {
        self.points.last()
    }

    /// Index of the final point, `None` for an empty trajectory.
    pub fn last_index(&self) -> Option<usize> {
        self.points.len().checked_sub(1)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrajectoryPoint> {
        self.points.iter()
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    /// Index of the last point captured at or before `t`.
    pub fn index_at_or_before(&self, t: OffsetDateTime) -> Option<usize> {
        self.points
            .partition_point(|p| p.captured_at <= t)
            .checked_sub(1)
    }

    pub fn is_chronological(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].captured_at <= w[1].captured_at)
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<TrajectoryPoint>> for Trajectory {
    fn from(points: Vec<TrajectoryPoint>) -> Self {
        Self::new(points)
    }
}

impl From<Trajectory> for Vec<TrajectoryPoint> {
    fn from(t: Trajectory) -> Self {
        t.points.to_vec()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Incident {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub coordinates: Option<LatLng>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub points: Trajectory,
    #[serde(default)]
    pub incidents: Vec<Incident>,
}

impl Trip {
    pub fn new(name: impl Into<String>, points: Vec<TrajectoryPoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            points: Trajectory::new(points),
            incidents: Vec::new(),
        }
    }

    /// Wall-clock time between the first and last sample.
    pub fn duration(&self) -> Option<time::Duration> {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => Some(b.captured_at - a.captured_at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn point(minute: u8) -> TrajectoryPoint {
        TrajectoryPoint {
            latitude: -23.55 + minute as f64 * 0.001,
            longitude: -46.63,
            captured_at: datetime!(2024-03-01 08:00 UTC) + time::Duration::minutes(minute as i64),
            note: None,
        }
    }

    #[test]
    fn test_index_at_or_before() {
        let t = Trajectory::new(vec![point(0), point(5), point(10)]);
        assert_eq!(t.index_at_or_before(datetime!(2024-03-01 07:59 UTC)), None);
        assert_eq!(t.index_at_or_before(datetime!(2024-03-01 08:00 UTC)), Some(0));
        assert_eq!(t.index_at_or_before(datetime!(2024-03-01 08:07 UTC)), Some(1));
        assert_eq!(t.index_at_or_before(datetime!(2024-03-01 09:00 UTC)), Some(2));
        assert_eq!(Trajectory::default().index_at_or_before(datetime!(2024-03-01 08:00 UTC)), None);
    }

    #[test]
    fn test_last_index_and_order() {
        assert_eq!(Trajectory::default().last_index(), None);
        let t = Trajectory::new(vec![point(0), point(1)]);
        assert_eq!(t.last_index(), Some(1));
        assert!(t.is_chronological());
        assert!(!Trajectory::new(vec![point(3), point(1)]).is_chronological());
    }

    #[test]
    fn test_trip_from_json() {
        let raw = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "name": "Rota Centro",
            "points": [
                {"latitude": -23.5, "longitude": -46.6, "captured_at": "2024-03-01T08:00:00Z"},
                {"latitude": -23.6, "longitude": -46.7, "captured_at": "2024-03-01T08:01:00Z", "note": "parada"}
            ],
            "incidents": [
                {"id": "9b2f4d1e-4c1a-4f0e-8d55-3f1c2b8a7e60", "name": "Lixeira quebrada",
                 "timestamp": "2024-03-01T08:00:30Z",
                 "coordinates": {"latitude": -23.55, "longitude": -46.65}}
            ]
        }"#;
        let trip: Trip = serde_json::from_str(raw).unwrap();
        assert_eq!(trip.points.len(), 2);
        assert_eq!(trip.points.get(1).unwrap().note.as_deref(), Some("parada"));
        assert_eq!(trip.incidents.len(), 1);
        assert!(trip.incidents[0].photo_url.is_none());
        assert_eq!(trip.duration(), Some(time::Duration::minutes(1)));
    }

    #[test]
    fn test_trip_without_points() {
        let trip: Trip =
            serde_json::from_str(r#"{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}"#).unwrap();
        assert!(trip.points.is_empty());
        assert!(trip.duration().is_none());
    }
}
