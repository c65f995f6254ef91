//! Core domain types for the Mapty workout log.
//!
//! This module defines the fundamental types used throughout the system:
//! - Coordinates, places and workout identity
//! - The two workout disciplines (running and cycling)
//! - The workout record itself, with its derived metric and description

use crate::{Error, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Location Types
// ============================================================================

/// A point on the map, in decimal degrees
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude within ±90 and longitude within ±180 (NaN is never in range)
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lng)
    }
}

/// Reverse-geocoded place name for a workout's coordinates
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub city: String,
    pub country: String,
}

// ============================================================================
// Identity
// ============================================================================

/// Stable identity of a workout, assigned once at creation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct WorkoutId(String);

impl WorkoutId {
    /// Allocate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkoutId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkoutId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Discipline Types
// ============================================================================

/// Tag distinguishing the two workout variants
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutKind {
    Running,
    Cycling,
}

impl WorkoutKind {
    /// Tag used in stored records and CSS-style class names
    pub fn as_str(self) -> &'static str {
        match self {
            WorkoutKind::Running => "running",
            WorkoutKind::Cycling => "cycling",
        }
    }

    /// Capitalized label used in descriptions
    pub fn label(self) -> &'static str {
        match self {
            WorkoutKind::Running => "Running",
            WorkoutKind::Cycling => "Cycling",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            WorkoutKind::Running => "🏃‍♂️",
            WorkoutKind::Cycling => "🚴‍♀️",
        }
    }
}

impl fmt::Display for WorkoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "running" | "run" => Ok(WorkoutKind::Running),
            "cycling" | "cycle" | "ride" => Ok(WorkoutKind::Cycling),
            other => Err(Error::UnknownVariant(other.to_string())),
        }
    }
}

/// Variant-specific measurement. Exactly one exists per workout.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discipline {
    /// Steps per minute
    Running { cadence: f64 },
    /// Metres climbed
    Cycling { elevation_gain: f64 },
}

impl Discipline {
    pub fn kind(&self) -> WorkoutKind {
        match self {
            Discipline::Running { .. } => WorkoutKind::Running,
            Discipline::Cycling { .. } => WorkoutKind::Cycling,
        }
    }

    pub fn cadence(&self) -> Option<f64> {
        match self {
            Discipline::Running { cadence } => Some(*cadence),
            Discipline::Cycling { .. } => None,
        }
    }

    pub fn elevation_gain(&self) -> Option<f64> {
        match self {
            Discipline::Cycling { elevation_gain } => Some(*elevation_gain),
            Discipline::Running { .. } => None,
        }
    }
}

/// Input fields that can be named in validation failures
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Coords,
    Distance,
    Duration,
    Cadence,
    ElevationGain,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Coords => "coordinates",
            Field::Distance => "distance",
            Field::Duration => "duration",
            Field::Cadence => "cadence",
            Field::ElevationGain => "elevation gain",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Workout
// ============================================================================

/// The user-editable base fields of a workout.
///
/// Everything else on a [`Workout`] is either fixed at creation (`id`,
/// `created_at`), resolved externally (`location`, `temperature`), or derived.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkoutFields {
    pub coords: Coords,
    pub title: String,
    /// Kilometres
    pub distance: f64,
    /// Minutes
    pub duration: f64,
    pub discipline: Discipline,
}

/// A recorded workout.
///
/// Fields are private so the derived metric and description can only be
/// produced by [`Workout::new`], [`Workout::restore`] and [`Workout::revise`].
#[derive(Clone, Debug, PartialEq)]
pub struct Workout {
    id: WorkoutId,
    created_at: DateTime<Utc>,
    fields: WorkoutFields,
    location: Option<Place>,
    temperature: Option<f64>,
    clicks: u32,
    metric: f64,
    description: String,
}

impl Workout {
    /// Create a brand-new workout with a fresh id, stamped now
    pub fn new(fields: WorkoutFields) -> Result<Self> {
        Self::restore(WorkoutId::generate(), Utc::now(), fields)
    }

    /// Shorthand for a new running workout
    pub fn running(
        coords: Coords,
        distance: f64,
        duration: f64,
        cadence: f64,
        title: impl Into<String>,
    ) -> Result<Self> {
        Self::new(WorkoutFields {
            coords,
            title: title.into(),
            distance,
            duration,
            discipline: Discipline::Running { cadence },
        })
    }

    /// Shorthand for a new cycling workout
    pub fn cycling(
        coords: Coords,
        distance: f64,
        duration: f64,
        elevation_gain: f64,
        title: impl Into<String>,
    ) -> Result<Self> {
        Self::new(WorkoutFields {
            coords,
            title: title.into(),
            distance,
            duration,
            discipline: Discipline::Cycling { elevation_gain },
        })
    }

    /// Rebuild a workout with a known identity and creation time
    pub fn restore(id: WorkoutId, created_at: DateTime<Utc>, fields: WorkoutFields) -> Result<Self> {
        check_measurements(&fields)?;
        let metric = compute_metric(&fields);
        let description = describe(fields.discipline.kind(), created_at);
        Ok(Self {
            id,
            created_at,
            fields,
            location: None,
            temperature: None,
            clicks: 0,
            metric,
            description,
        })
    }

    /// Produce a new value carrying `fields`, keeping identity, creation
    /// time, resolved lookups and the click counter.
    ///
    /// Switching discipline is just a different `fields.discipline`; the old
    /// variant's measurement does not survive.
    pub fn revise(&self, fields: WorkoutFields) -> Result<Self> {
        let mut revised = Self::restore(self.id.clone(), self.created_at, fields)?;
        revised.location = self.location.clone();
        revised.temperature = self.temperature;
        revised.clicks = self.clicks;
        Ok(revised)
    }

    pub fn with_location(mut self, location: Option<Place>) -> Self {
        self.location = location;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_clicks(mut self, clicks: u32) -> Self {
        self.clicks = clicks;
        self
    }

    pub(crate) fn set_location(&mut self, location: Option<Place>) {
        self.location = location;
    }

    pub(crate) fn set_temperature(&mut self, temperature: Option<f64>) {
        self.temperature = temperature;
    }

    /// Record one selection from the list
    pub fn click(&mut self) {
        self.clicks = self.clicks.saturating_add(1);
    }

    pub fn id(&self) -> &WorkoutId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn fields(&self) -> &WorkoutFields {
        &self.fields
    }

    pub fn kind(&self) -> WorkoutKind {
        self.fields.discipline.kind()
    }

    pub fn coords(&self) -> Coords {
        self.fields.coords
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn distance(&self) -> f64 {
        self.fields.distance
    }

    pub fn duration(&self) -> f64 {
        self.fields.duration
    }

    pub fn discipline(&self) -> Discipline {
        self.fields.discipline
    }

    pub fn cadence(&self) -> Option<f64> {
        self.fields.discipline.cadence()
    }

    pub fn elevation_gain(&self) -> Option<f64> {
        self.fields.discipline.elevation_gain()
    }

    /// Minutes per kilometre, running only
    pub fn pace(&self) -> Option<f64> {
        match self.kind() {
            WorkoutKind::Running => Some(self.metric),
            WorkoutKind::Cycling => None,
        }
    }

    /// Kilometres per hour, cycling only
    pub fn speed(&self) -> Option<f64> {
        match self.kind() {
            WorkoutKind::Cycling => Some(self.metric),
            WorkoutKind::Running => None,
        }
    }

    pub fn location(&self) -> Option<&Place> {
        self.location.as_ref()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    /// E.g. "Running on October 15"
    pub fn description(&self) -> &str {
        &self.description
    }
}

fn check_measurements(fields: &WorkoutFields) -> Result<()> {
    for (field, value) in [
        (Field::Distance, fields.distance),
        (Field::Duration, fields.duration),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidMeasurement { field, value });
        }
    }

    // Elevation may legitimately be zero on a flat ride; cadence may not.
    let (field, value, floor_ok) = match fields.discipline {
        Discipline::Running { cadence } => (Field::Cadence, cadence, cadence > 0.0),
        Discipline::Cycling { elevation_gain } => {
            (Field::ElevationGain, elevation_gain, elevation_gain >= 0.0)
        }
    };
    if !value.is_finite() || !floor_ok {
        return Err(Error::InvalidMeasurement { field, value });
    }

    let coords = fields.coords;
    if !coords.in_range() {
        return Err(Error::InvalidMeasurement {
            field: Field::Coords,
            value: if (-90.0..=90.0).contains(&coords.lat) {
                coords.lng
            } else {
                coords.lat
            },
        });
    }
    Ok(())
}

fn compute_metric(fields: &WorkoutFields) -> f64 {
    match fields.discipline {
        Discipline::Running { .. } => fields.duration / fields.distance,
        Discipline::Cycling { .. } => fields.distance / (fields.duration / 60.0),
    }
}

fn describe(kind: WorkoutKind, created_at: DateTime<Utc>) -> String {
    let local = created_at.with_timezone(&Local);
    format!("{} on {}", kind.label(), local.format("%B %-d"))
}
