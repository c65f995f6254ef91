//! One map marker per stored workout.
//!
//! The map itself is an external collaborator behind [`MapSurface`]; this
//! module only keeps the id -> handle bookkeeping honest. Markers are created
//! and removed in response to store mutations, never on their own.

use crate::{Coords, Error, Result, Workout, WorkoutId, WorkoutKind, WorkoutStore};
use std::collections::HashMap;

/// Opaque reference to a marker on the map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// What the map needs to draw a workout's marker
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerSpec {
    pub coords: Coords,
    pub popup: String,
    /// E.g. `running-popup`
    pub style_class: String,
}

impl MarkerSpec {
    pub fn for_workout(workout: &Workout) -> Self {
        Self {
            coords: workout.coords(),
            popup: format!("{} {}", workout.kind().icon(), workout.description()),
            style_class: style_class(workout.kind()),
        }
    }
}

fn style_class(kind: WorkoutKind) -> String {
    format!("{}-popup", kind.as_str())
}

/// The map collaborator
pub trait MapSurface {
    fn place_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn set_view(&mut self, center: Coords, zoom: u8);
}

/// Keeps exactly one marker handle per live workout
pub struct MarkerSync<M: MapSurface> {
    map: M,
    handles: HashMap<WorkoutId, MarkerHandle>,
}

impl<M: MapSurface> MarkerSync<M> {
    pub fn new(map: M) -> Self {
        Self {
            map,
            handles: HashMap::new(),
        }
    }

    /// Place the marker for a workout that was just added to the store
    pub fn create_marker_for(&mut self, workout: &Workout) -> Result<MarkerHandle> {
        if self.handles.contains_key(workout.id()) {
            return Err(Error::DuplicateId(workout.id().clone()));
        }
        let handle = self.map.place_marker(&MarkerSpec::for_workout(workout));
        self.handles.insert(workout.id().clone(), handle);
        tracing::debug!("Placed marker {:?} for workout {}", handle, workout.id());
        Ok(handle)
    }

    /// Take down the marker of a workout leaving the store (or being redrawn)
    pub fn remove_marker_for(&mut self, id: &WorkoutId) -> Result<()> {
        let handle = self
            .handles
            .remove(id)
            .ok_or_else(|| Error::MarkerNotFound(id.clone()))?;
        self.map.remove_marker(handle);
        tracing::debug!("Removed marker {:?} for workout {}", handle, id);
        Ok(())
    }

    /// Redraw after an edit moved the workout or changed its discipline
    pub fn replace_marker_for(&mut self, workout: &Workout) -> Result<MarkerHandle> {
        self.remove_marker_for(workout.id())?;
        self.create_marker_for(workout)
    }

    /// Remove every marker, e.g. after the store was cleared
    pub fn clear(&mut self) {
        for (_, handle) in self.handles.drain() {
            self.map.remove_marker(handle);
        }
    }

    pub fn handle_for(&self, id: &WorkoutId) -> Option<MarkerHandle> {
        self.handles.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// True when every stored workout has exactly one marker and no marker
    /// is left over for a workout that is gone
    pub fn is_in_sync_with(&self, store: &WorkoutStore) -> bool {
        self.handles.len() == store.len() && store.iter().all(|w| self.handles.contains_key(w.id()))
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Map double that records what is currently drawn
    #[derive(Default)]
    pub(crate) struct RecordingMap {
        next: u64,
        pub(crate) drawn: BTreeMap<u64, MarkerSpec>,
        pub(crate) view: Option<(Coords, u8)>,
    }

    impl MapSurface for RecordingMap {
        fn place_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle {
            self.next += 1;
            self.drawn.insert(self.next, spec.clone());
            MarkerHandle(self.next)
        }

        fn remove_marker(&mut self, handle: MarkerHandle) {
            self.drawn.remove(&handle.0);
        }

        fn set_view(&mut self, center: Coords, zoom: u8) {
            self.view = Some((center, zoom));
        }
    }

    fn run() -> Workout {
        Workout::running(Coords::new(40.0, -73.0), 5.0, 30.0, 170.0, "run").unwrap()
    }

    #[test]
    fn test_marker_spec_keyed_by_variant() {
        let spec = MarkerSpec::for_workout(&run());
        assert_eq!(spec.style_class, "running-popup");
        assert!(spec.popup.contains("Running on"));
    }

    #[test]
    fn test_create_and_remove() {
        let mut sync = MarkerSync::new(RecordingMap::default());
        let w = run();

        sync.create_marker_for(&w).unwrap();
        assert_eq!(sync.map().drawn.len(), 1);
        assert!(sync.handle_for(w.id()).is_some());

        sync.remove_marker_for(w.id()).unwrap();
        assert!(sync.map().drawn.is_empty());
        assert!(sync.is_empty());
    }

    #[test]
    fn test_remove_unknown_marker() {
        let mut sync = MarkerSync::new(RecordingMap::default());
        let result = sync.remove_marker_for(&WorkoutId::from("ghost"));
        assert!(matches!(result, Err(Error::MarkerNotFound(_))));
    }

    #[test]
    fn test_second_marker_for_same_workout_rejected() {
        let mut sync = MarkerSync::new(RecordingMap::default());
        let w = run();
        sync.create_marker_for(&w).unwrap();
        assert!(sync.create_marker_for(&w).is_err());
        assert_eq!(sync.map().drawn.len(), 1);
    }

    #[test]
    fn test_replace_redraws_single_marker() {
        let mut sync = MarkerSync::new(RecordingMap::default());
        let w = run();
        let first = sync.create_marker_for(&w).unwrap();

        let mut fields = w.fields().clone();
        fields.coords = Coords::new(41.0, -74.0);
        let moved = w.revise(fields).unwrap();
        let second = sync.replace_marker_for(&moved).unwrap();

        assert_ne!(first, second);
        assert_eq!(sync.map().drawn.len(), 1);
        assert_eq!(sync.map().drawn[&second.0].coords, Coords::new(41.0, -74.0));
    }

    #[test]
    fn test_sync_check_against_store() {
        let mut store = WorkoutStore::new();
        let mut sync = MarkerSync::new(RecordingMap::default());
        let a = run();
        let b = run();

        store.add(a.clone()).unwrap();
        sync.create_marker_for(&a).unwrap();
        assert!(sync.is_in_sync_with(&store));

        store.add(b).unwrap();
        assert!(!sync.is_in_sync_with(&store));

        sync.clear();
        assert!(sync.map().drawn.is_empty());
    }
}
