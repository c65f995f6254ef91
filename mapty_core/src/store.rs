//! In-memory ordered collection of workouts.
//!
//! Iteration follows insertion (creation) order, oldest first. Every
//! mutation either fully applies or leaves the store untouched.

use crate::{Error, Place, Result, Workout, WorkoutFields, WorkoutId};

#[derive(Clone, Debug, Default)]
pub struct WorkoutStore {
    workouts: Vec<Workout>,
}

impl WorkoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a workout; its id must not already be present
    pub fn add(&mut self, workout: Workout) -> Result<()> {
        if self.position(workout.id()).is_some() {
            return Err(Error::DuplicateId(workout.id().clone()));
        }
        tracing::debug!("Added workout {} to store", workout.id());
        self.workouts.push(workout);
        Ok(())
    }

    /// Remove and return a workout so callers can clean up after it
    pub fn remove(&mut self, id: &WorkoutId) -> Result<Workout> {
        let index = self
            .position(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        tracing::debug!("Removed workout {} from store", id);
        Ok(self.workouts.remove(index))
    }

    /// Apply a change to a workout's base fields and re-derive its metrics.
    ///
    /// The mutator works on a copy; the stored record is only replaced once
    /// the revised workout has been validated by the model.
    pub fn update<F>(&mut self, id: &WorkoutId, mutator: F) -> Result<&Workout>
    where
        F: FnOnce(&mut WorkoutFields),
    {
        let index = self
            .position(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        let mut fields = self.workouts[index].fields().clone();
        mutator(&mut fields);
        let revised = self.workouts[index].revise(fields)?;

        self.workouts[index] = revised;
        tracing::debug!("Updated workout {}", id);
        Ok(&self.workouts[index])
    }

    /// Store lookup results resolved for a workout's coordinates
    pub fn enrich(
        &mut self,
        id: &WorkoutId,
        location: Option<Place>,
        temperature: Option<f64>,
    ) -> Result<&Workout> {
        let workout = self.get_mut(id)?;
        workout.set_location(location);
        workout.set_temperature(temperature);
        Ok(&*workout)
    }

    /// Count one selection of the workout from the list
    pub fn click(&mut self, id: &WorkoutId) -> Result<&Workout> {
        let workout = self.get_mut(id)?;
        workout.click();
        Ok(&*workout)
    }

    pub fn find_by_id(&self, id: &WorkoutId) -> Option<&Workout> {
        self.workouts.iter().find(|w| w.id() == id)
    }

    pub fn contains(&self, id: &WorkoutId) -> bool {
        self.position(id).is_some()
    }

    /// All workouts in insertion order
    pub fn all(&self) -> &[Workout] {
        &self.workouts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workout> {
        self.workouts.iter()
    }

    pub fn len(&self) -> usize {
        self.workouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }

    /// Drop every workout, returning them in insertion order
    pub fn clear(&mut self) -> Vec<Workout> {
        std::mem::take(&mut self.workouts)
    }

    fn position(&self, id: &WorkoutId) -> Option<usize> {
        self.workouts.iter().position(|w| w.id() == id)
    }

    fn get_mut(&mut self, id: &WorkoutId) -> Result<&mut Workout> {
        self.workouts
            .iter_mut()
            .find(|w| w.id() == id)
            .ok_or_else(|| Error::NotFound(id.clone()))
    }
}
