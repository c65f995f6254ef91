//! Error types for the mapty_core library.

use crate::{Field, WorkoutId};
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mapty_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A distance, duration or discipline measurement the model cannot accept
    #[error("Invalid measurement for {field}: {value}")]
    InvalidMeasurement { field: Field, value: f64 },

    /// A list filter or sort order name that is not recognised
    #[error("Unknown {what}: {value:?}")]
    UnknownChoice { what: &'static str, value: String },

    /// Stored record carries a variant tag we do not know
    #[error("Unknown workout type: {0:?}")]
    UnknownVariant(String),

    /// Stored record is missing a required field or has the wrong shape
    #[error("Malformed workout record: {0}")]
    MalformedRecord(String),

    #[error("Workout {0} already exists")]
    DuplicateId(WorkoutId),

    #[error("Workout {0} not found")]
    NotFound(WorkoutId),

    #[error("No marker registered for workout {0}")]
    MarkerNotFound(WorkoutId),

    /// User input failed validation; lists every offending field
    #[error("Invalid input: {}", join_fields(.0))]
    Validation(Vec<Field>),

    /// Weather, geocoding or geolocation collaborator failed
    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Another submission is still in progress")]
    SubmissionInFlight,

    /// The session moved on while the submission was awaiting lookups
    #[error("Submission was superseded before it completed")]
    StaleSubmission,

    #[error("Select a point on the map first")]
    NoPointSelected,
}

impl Error {
    /// Problems the user can fix by changing their input.
    ///
    /// These surface as a notice; everything else is logged and aborts the
    /// operation.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::NoPointSelected | Error::InvalidMeasurement { .. }
        )
    }
}

fn join_fields(fields: &[Field]) -> String {
    let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    match names.as_slice() {
        [] => "no fields".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
