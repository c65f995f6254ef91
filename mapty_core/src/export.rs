//! CSV export of the workout log.
//!
//! The export is a snapshot: the file is rewritten in full each time, in the
//! order the workouts are given.

use crate::{Result, Workout};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    kind: &'static str,
    created_at: String,
    title: &'a str,
    lat: f64,
    lng: f64,
    distance: f64,
    duration: f64,
    cadence: Option<f64>,
    elevation_gain: Option<f64>,
    pace: Option<f64>,
    speed: Option<f64>,
    city: Option<&'a str>,
    country: Option<&'a str>,
    temperature: Option<f64>,
    clicks: u32,
}

impl<'a> From<&'a Workout> for CsvRow<'a> {
    fn from(workout: &'a Workout) -> Self {
        let coords = workout.coords();
        let location = workout.location();
        CsvRow {
            id: workout.id().as_str(),
            kind: workout.kind().as_str(),
            created_at: workout.created_at().to_rfc3339(),
            title: workout.title(),
            lat: coords.lat,
            lng: coords.lng,
            distance: workout.distance(),
            duration: workout.duration(),
            cadence: workout.cadence(),
            elevation_gain: workout.elevation_gain(),
            pace: workout.pace().map(round2),
            speed: workout.speed().map(round2),
            city: location.map(|p| p.city.as_str()),
            country: location.map(|p| p.country.as_str()),
            temperature: workout.temperature(),
            clicks: workout.clicks(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Write workouts to `writer` as CSV with a header row
pub fn write_csv<'a, W, I>(writer: W, workouts: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Workout>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);

    let mut count = 0;
    for workout in workouts {
        csv_writer.serialize(CsvRow::from(workout))?;
        count += 1;
    }
    csv_writer.flush()?;
    Ok(count)
}

/// Export workouts to a CSV file, replacing it atomically
///
/// The CSV is written to a temp file next to `path` and fsynced before it
/// is renamed into place, so a crash never leaves a half-written export.
pub fn export_csv<'a, I>(path: &Path, workouts: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Workout>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    let count = write_csv(&mut temp, workouts)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| crate::Error::Io(e.error))?;

    tracing::info!("Exported {} workouts to {:?}", count, path);
    Ok(count)
}
