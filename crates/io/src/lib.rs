use anyhow::{bail, Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{Serialize, Deserialize};
use time::OffsetDateTime;
use tracing::{debug, warn};
use model::*;

/// Where a trip comes from before playback starts.
#[async_trait::async_trait]
pub trait TripSource: Send + Sync {
    async fn load(&self) -> Result<Trip>;
}

pub struct FileTripSource {
    path: PathBuf,
}

impl FileTripSource {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

#[async_trait::async_trait]
impl TripSource for FileTripSource {
    async fn load(&self) -> Result<Trip> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_trip(&path))
            .await
            .context("trip loader task panicked")?
    }
}

/// Load one trip, picking the format from the file extension.
pub fn load_trip(path: &Path) -> Result<Trip> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let trip = match ext.as_str() {
        "json" => load_trip_json(path)?,
        "ndjson" | "jsonl" => import_ndjson(path)?
            .into_iter()
            .next()
            .with_context(|| format!("{} holds no trips", path.display()))?,
        "csv" => {
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("trip");
            Trip::new(name, import_points_csv(path)?)
        }
        other => bail!("unsupported trip file extension {:?} for {}", other, path.display()),
    };
    check_order(&trip);
    debug!(
        path = %path.display(),
        points = trip.points.len(),
        incidents = trip.incidents.len(),
        "trip loaded"
    );
    Ok(trip)
}

pub fn load_trip_json(path: &Path) -> Result<Trip> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let trip = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse trip {}", path.display()))?;
    Ok(trip)
}

pub fn import_points_csv(path: &Path) -> Result<Vec<TrajectoryPoint>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut points = Vec::new();
    for (i, rec) in rdr.deserialize().enumerate() {
        let r: CsvRow = rec.with_context(|| format!("{} row {}", path.display(), i + 1))?;
        points.push(TrajectoryPoint {
            latitude: r.latitude,
            longitude: r.longitude,
            captured_at: r.captured_at,
            note: r.note.filter(|n| !n.is_empty()),
        });
    }
    Ok(points)
}

pub fn export_points_csv(points: &Trajectory, path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    for p in points.iter() {
        w.serialize(CsvRow {
            latitude: p.latitude,
            longitude: p.longitude,
            captured_at: p.captured_at,
            note: p.note.clone(),
        })?;
    }
    w.flush()?;
    Ok(())
}

pub fn import_ndjson(path: &Path) -> Result<Vec<Trip>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut trips = vec![];
    for (i, line) in rdr.lines().enumerate() {
        let s = line?;
        if s.trim().is_empty() {
            continue;
        }
        let t: Trip = serde_json::from_str(&s)
            .with_context(|| format!("{} line {}", path.display(), i + 1))?;
        trips.push(t);
    }
    Ok(trips)
}

pub fn export_ndjson(trips: &[Trip], path: &Path) -> Result<()> {
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);
    for t in trips {
        let s = serde_json::to_string(t)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    Ok(())
}

/// Pretty-printed JSON of anything serializable, e.g. map layers.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    Ok(())
}

/// Playback trusts the upstream order, so out-of-order input is only reported.
fn check_order(trip: &Trip) {
    if !trip.points.is_chronological() {
        warn!(trip = %trip.id, "trip points are not in capture order; playing them as given");
    }
}

#[derive(Serialize, Deserialize)]
struct CsvRow {
    latitude: f64,
    longitude: f64,
    #[serde(with = "time::serde::rfc3339")]
    captured_at: OffsetDateTime,
    note: Option<String>,
}
