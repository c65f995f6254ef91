//! Create/edit session controller.
//!
//! A single slot holds either a *create* session (waiting for a map point and
//! form input) or an *edit* session for one stored workout. Every submission
//! goes through [`EditSession::submit`], which dispatches on the current
//! mode, so input can never be credited to the wrong one.
//!
//! Submission has three phases:
//! 1. [`EditSession::prepare`] validates input and claims a [`Ticket`]. Only
//!    one ticket can be outstanding; a second submission is refused.
//! 2. Lookups run for the ticket's coordinates (the only await point).
//! 3. [`EditSession::complete`] applies the result, but only if the ticket is
//!    still the pending one. Cancelling, starting another edit or picking a
//!    new point in the meantime makes the ticket stale and its result is
//!    dropped.

use crate::lookup::{enrich, Enrichment, GeocodeLookup, WeatherLookup};
use crate::{
    Coords, Discipline, Error, Field, Result, Workout, WorkoutFields, WorkoutId, WorkoutKind,
    WorkoutStore,
};

/// Which input path is live
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Creating,
    Editing(WorkoutId),
}

/// Unsaved form values.
///
/// Numbers are optional because an empty form field is a validation error,
/// not a zero. Only the measurement matching `kind` is read; the other one is
/// ignored and never reaches the store.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedInput {
    pub kind: WorkoutKind,
    pub title: String,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub cadence: Option<f64>,
    pub elevation_gain: Option<f64>,
    /// Overrides the selected map point (create) or the stored position (edit)
    pub coords: Option<Coords>,
}

impl Default for StagedInput {
    fn default() -> Self {
        Self {
            kind: WorkoutKind::Running,
            title: String::new(),
            distance: None,
            duration: None,
            cadence: None,
            elevation_gain: None,
            coords: None,
        }
    }
}

impl StagedInput {
    /// Form values pre-filled from a stored workout
    pub fn from_workout(workout: &Workout) -> Self {
        Self {
            kind: workout.kind(),
            title: workout.title().to_string(),
            distance: Some(workout.distance()),
            duration: Some(workout.duration()),
            cadence: workout.cadence(),
            elevation_gain: workout.elevation_gain(),
            coords: Some(workout.coords()),
        }
    }

    /// Check every field and build the base fields for the model.
    ///
    /// All offending fields are reported together.
    pub fn validate(&self, coords: Coords) -> Result<WorkoutFields> {
        let mut invalid = Vec::new();

        if self.title.trim().is_empty() {
            invalid.push(Field::Title);
        }
        if !coords.in_range() {
            invalid.push(Field::Coords);
        }
        let distance = positive(self.distance, Field::Distance, &mut invalid);
        let duration = positive(self.duration, Field::Duration, &mut invalid);
        let discipline = match self.kind {
            WorkoutKind::Running => {
                positive(self.cadence, Field::Cadence, &mut invalid)
                    .map(|cadence| Discipline::Running { cadence })
            }
            WorkoutKind::Cycling => {
                positive(self.elevation_gain, Field::ElevationGain, &mut invalid)
                    .map(|elevation_gain| Discipline::Cycling { elevation_gain })
            }
        };

        match (distance, duration, discipline) {
            (Some(distance), Some(duration), Some(discipline)) if invalid.is_empty() => {
                Ok(WorkoutFields {
                    coords,
                    title: self.title.trim().to_string(),
                    distance,
                    duration,
                    discipline,
                })
            }
            _ => Err(Error::Validation(invalid)),
        }
    }
}

fn positive(value: Option<f64>, field: Field, invalid: &mut Vec<Field>) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Some(v),
        _ => {
            invalid.push(field);
            None
        }
    }
}

/// Claim on the single pending submission
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ticket {
    serial: u64,
    /// Where lookups should be resolved
    pub coords: Coords,
    /// False for edits that keep the stored position
    pub needs_lookup: bool,
}

/// What a completed submission did to the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Added(WorkoutId),
    /// `relocated` is set when coords or discipline changed and the
    /// workout's marker must be redrawn
    Updated { id: WorkoutId, relocated: bool },
}

#[derive(Debug)]
struct Pending {
    serial: u64,
    target: Mode,
    fields: WorkoutFields,
}

/// The single-slot create/edit state machine
#[derive(Debug, Default)]
pub struct EditSession {
    mode: Mode,
    point: Option<Coords>,
    staged: Option<StagedInput>,
    pending: Option<Pending>,
    next_serial: u64,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Id of the workout being edited, if any
    pub fn editing(&self) -> Option<&WorkoutId> {
        match &self.mode {
            Mode::Editing(id) => Some(id),
            Mode::Creating => None,
        }
    }

    /// Map point chosen for the next new workout
    pub fn point(&self) -> Option<Coords> {
        self.point
    }

    pub fn staged(&self) -> Option<&StagedInput> {
        self.staged.as_ref()
    }

    /// A submission is waiting on its lookups
    pub fn is_submitting(&self) -> bool {
        self.pending.is_some()
    }

    /// The map reported a click: start a create session at that point.
    ///
    /// Any edit in progress is abandoned along with its staged input.
    pub fn select_point(&mut self, coords: Coords) {
        if let Mode::Editing(id) = &self.mode {
            tracing::info!("Abandoning edit of {} for a new workout", id);
        }
        self.drop_pending();
        self.mode = Mode::Creating;
        self.staged = None;
        self.point = Some(coords);
    }

    /// Switch to editing `id`, staging its current values.
    ///
    /// Calling this while another edit is open replaces the target and
    /// discards whatever was staged for it.
    pub fn begin_edit(&mut self, id: &WorkoutId, store: &WorkoutStore) -> Result<&StagedInput> {
        let workout = store
            .find_by_id(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        if let Mode::Editing(previous) = &self.mode {
            if previous != id {
                tracing::debug!("Replacing edit target {} with {}", previous, id);
            }
        }
        self.drop_pending();
        self.mode = Mode::Editing(id.clone());
        self.point = None;
        Ok(&*self.staged.insert(StagedInput::from_workout(workout)))
    }

    /// Close the form: discard staged input and return to create mode
    pub fn cancel(&mut self) {
        self.drop_pending();
        self.mode = Mode::Creating;
        self.staged = None;
        self.point = None;
    }

    /// Validate input for the current mode and claim the pending slot
    pub fn prepare(&mut self, input: StagedInput, store: &WorkoutStore) -> Result<Ticket> {
        if self.pending.is_some() {
            return Err(Error::SubmissionInFlight);
        }

        let (coords, needs_lookup) = match &self.mode {
            Mode::Creating => {
                let coords = input.coords.or(self.point).ok_or(Error::NoPointSelected)?;
                (coords, true)
            }
            Mode::Editing(id) => {
                let current = store
                    .find_by_id(id)
                    .ok_or_else(|| Error::NotFound(id.clone()))?;
                let coords = input.coords.unwrap_or_else(|| current.coords());
                (coords, coords != current.coords())
            }
        };

        let fields = input.validate(coords)?;
        if let Mode::Editing(_) = self.mode {
            self.staged = Some(input);
        }

        self.next_serial += 1;
        let serial = self.next_serial;
        self.pending = Some(Pending {
            serial,
            target: self.mode.clone(),
            fields,
        });

        Ok(Ticket {
            serial,
            coords,
            needs_lookup,
        })
    }

    /// Apply a prepared submission if it is still the pending one
    pub fn complete(
        &mut self,
        ticket: Ticket,
        enrichment: Enrichment,
        store: &mut WorkoutStore,
    ) -> Result<Change> {
        let pending = match self.pending.take() {
            Some(p) if p.serial == ticket.serial => p,
            other => {
                self.pending = other;
                tracing::warn!("Discarding stale submission #{}", ticket.serial);
                return Err(Error::StaleSubmission);
            }
        };

        match pending.target {
            Mode::Creating => {
                let workout = Workout::new(pending.fields)?
                    .with_location(enrichment.location)
                    .with_temperature(enrichment.temperature);
                let id = workout.id().clone();
                store.add(workout)?;
                self.point = None;
                tracing::info!("Created workout {}", id);
                Ok(Change::Added(id))
            }
            Mode::Editing(id) => {
                // The session is over whether or not the update lands
                self.mode = Mode::Creating;
                self.staged = None;

                let before = store
                    .find_by_id(&id)
                    .map(|w| (w.coords(), w.kind()))
                    .ok_or_else(|| Error::NotFound(id.clone()))?;
                let after = (pending.fields.coords, pending.fields.discipline.kind());

                let fields = pending.fields;
                store.update(&id, move |f| *f = fields)?;
                if ticket.needs_lookup {
                    store.enrich(&id, enrichment.location, enrichment.temperature)?;
                }

                tracing::info!("Updated workout {}", id);
                Ok(Change::Updated {
                    id,
                    relocated: before != after,
                })
            }
        }
    }

    /// Validate, resolve lookups and apply, according to the current mode
    pub async fn submit<W, G>(
        &mut self,
        input: StagedInput,
        store: &mut WorkoutStore,
        weather: &W,
        geocode: &G,
    ) -> Result<Change>
    where
        W: WeatherLookup,
        G: GeocodeLookup,
    {
        let ticket = self.prepare(input, store)?;
        let enrichment = if ticket.needs_lookup {
            enrich(ticket.coords, weather, geocode).await
        } else {
            Enrichment::default()
        };
        self.complete(ticket, enrichment, store)
    }

    fn drop_pending(&mut self) {
        if let Some(p) = self.pending.take() {
            tracing::debug!("Dropped pending submission #{}", p.serial);
        }
    }
}
