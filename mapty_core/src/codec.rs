//! Conversion between workouts and plain storable records.
//!
//! A [`WorkoutRecord`] carries no behavior: it is what gets written to the
//! store blob and what comes back out of it. Derived values (pace, speed,
//! description) are written for the benefit of other readers but never
//! trusted on the way back in; [`decode`] always recomputes them through the
//! model.

use crate::{
    Coords, Discipline, Error, Place, Result, Workout, WorkoutFields, WorkoutId, WorkoutKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Behavior-free projection of a [`Workout`]
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRecord {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Older records call this `date`
    #[serde(alias = "date", default)]
    pub created_at: Option<DateTime<Utc>>,

    /// `[lat, lng]`
    #[serde(default)]
    pub coords: Option<Vec<f64>>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub distance: Option<f64>,

    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_gain: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Place>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Selection counter. Persisted as part of the record's state.
    #[serde(default)]
    pub clicks: u32,
}

/// Project every field of a workout, including its variant tag
pub fn encode(workout: &Workout) -> WorkoutRecord {
    let coords = workout.coords();
    WorkoutRecord {
        id: Some(workout.id().to_string()),
        kind: Some(workout.kind().as_str().to_string()),
        created_at: Some(workout.created_at()),
        coords: Some(vec![coords.lat, coords.lng]),
        title: Some(workout.title().to_string()),
        distance: Some(workout.distance()),
        duration: Some(workout.duration()),
        cadence: workout.cadence(),
        elevation_gain: workout.elevation_gain(),
        pace: workout.pace(),
        speed: workout.speed(),
        description: Some(workout.description().to_string()),
        location: workout.location().cloned(),
        temperature: workout.temperature(),
        clicks: workout.clicks(),
    }
}

/// Rebuild the right workout variant from a record
pub fn decode(record: WorkoutRecord) -> Result<Workout> {
    let kind_tag = record.kind.ok_or_else(|| missing("type"))?;
    let kind = match kind_tag.as_str() {
        "running" => WorkoutKind::Running,
        "cycling" => WorkoutKind::Cycling,
        _ => return Err(Error::UnknownVariant(kind_tag)),
    };

    let id = record
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| missing("id"))?;
    let created_at = record.created_at.ok_or_else(|| missing("createdAt"))?;
    let coords = match record.coords.as_deref() {
        Some([lat, lng]) => Coords::new(*lat, *lng),
        Some(other) => {
            return Err(Error::MalformedRecord(format!(
                "coords must hold exactly two numbers, found {}",
                other.len()
            )))
        }
        None => return Err(missing("coords")),
    };
    let distance = record.distance.ok_or_else(|| missing("distance"))?;
    let duration = record.duration.ok_or_else(|| missing("duration"))?;

    let discipline = match kind {
        WorkoutKind::Running => Discipline::Running {
            cadence: record.cadence.ok_or_else(|| missing("cadence"))?,
        },
        WorkoutKind::Cycling => Discipline::Cycling {
            elevation_gain: record
                .elevation_gain
                .ok_or_else(|| missing("elevationGain"))?,
        },
    };

    let fields = WorkoutFields {
        coords,
        title: record.title.unwrap_or_default(),
        distance,
        duration,
        discipline,
    };

    let workout = Workout::restore(WorkoutId::from(id), created_at, fields)
        .map_err(|e| Error::MalformedRecord(e.to_string()))?
        .with_location(record.location)
        .with_temperature(record.temperature)
        .with_clicks(record.clicks);

    Ok(workout)
}

/// Decode a loosely-typed JSON value, classifying shape errors as malformed
pub fn decode_value(value: serde_json::Value) -> Result<Workout> {
    let record: WorkoutRecord =
        serde_json::from_value(value).map_err(|e| Error::MalformedRecord(e.to_string()))?;
    decode(record)
}

fn missing(field: &str) -> Error {
    Error::MalformedRecord(format!("missing required field `{}`", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_run() -> Workout {
        Workout::running(Coords::new(40.0, -73.0), 5.0, 30.0, 170.0, "Morning run").unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let mut run = sample_run()
            .with_location(Some(Place {
                city: "New York".into(),
                country: "US".into(),
            }))
            .with_temperature(Some(18.0));
        run.click();
        run.click();

        let back = decode(encode(&run)).unwrap();

        assert_eq!(back.id(), run.id());
        assert_eq!(back.coords(), run.coords());
        assert_eq!(back.title(), run.title());
        assert_eq!(back.distance(), run.distance());
        assert_eq!(back.duration(), run.duration());
        assert_eq!(back.kind(), WorkoutKind::Running);
        assert_eq!(back.cadence(), Some(170.0));
        assert_eq!(back.location(), run.location());
        assert_eq!(back.temperature(), Some(18.0));
        assert_eq!(back.clicks(), 2);
        assert_eq!(back, run);
    }

    #[test]
    fn test_cycling_roundtrip_through_json() {
        let ride = Workout::cycling(Coords::new(51.5, -0.1), 42.0, 90.0, 350.0, "Sunday").unwrap();
        let json = serde_json::to_string(&encode(&ride)).unwrap();
        let back: WorkoutRecord = serde_json::from_str(&json).unwrap();
        let back = decode(back).unwrap();

        assert_eq!(back.kind(), WorkoutKind::Cycling);
        assert_eq!(back.elevation_gain(), Some(350.0));
        assert_eq!(back.speed(), ride.speed());
    }

    #[test]
    fn test_stored_derived_values_are_ignored() {
        let mut record = encode(&sample_run());
        record.pace = Some(999.0);
        record.description = Some("tampered".into());

        let back = decode(record).unwrap();
        assert_eq!(back.pace(), Some(6.0));
        assert_ne!(back.description(), "tampered");
    }

    #[test]
    fn test_unknown_variant() {
        let mut record = encode(&sample_run());
        record.kind = Some("swimming".into());

        assert!(matches!(decode(record), Err(Error::UnknownVariant(tag)) if tag == "swimming"));
    }

    #[test]
    fn test_missing_variant_field_is_malformed() {
        let mut record = encode(&sample_run());
        record.cadence = None;
        assert!(matches!(decode(record), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_non_numeric_distance_is_malformed() {
        let value = json!({
            "id": "1700000000",
            "type": "running",
            "createdAt": "2024-05-01T07:30:00Z",
            "coords": [40.0, -73.0],
            "distance": "five",
            "duration": 30,
            "cadence": 170
        });
        assert!(matches!(decode_value(value), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_legacy_record_without_title() {
        let value = json!({
            "id": "1700000000",
            "type": "cycling",
            "date": "2024-05-01T07:30:00Z",
            "coords": [40.0, -73.0],
            "distance": 20,
            "duration": 60,
            "elevationGain": 0,
            "speed": 20
        });
        let ride = decode_value(value).unwrap();
        assert_eq!(ride.title(), "");
        assert_eq!(ride.speed(), Some(20.0));
        assert_eq!(ride.clicks(), 0);
    }

    #[test]
    fn test_negative_distance_is_malformed() {
        let mut record = encode(&sample_run());
        record.distance = Some(-1.0);
        assert!(matches!(decode(record), Err(Error::MalformedRecord(_))));
    }
}
