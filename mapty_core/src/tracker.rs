//! Composition root tying the workout log together.
//!
//! [`Tracker`] owns the store and every collaborator. Each store mutation is
//! followed by marker reconciliation and a full snapshot to storage, so the
//! map and the saved blob always reflect the store.

use crate::config::Config;
use crate::edit::{Change, EditSession, StagedInput};
use crate::lookup::{GeocodeLookup, PositionSource, WeatherLookup};
use crate::markers::{MapSurface, MarkerSync};
use crate::notice::Notices;
use crate::storage::{Gateway, KeyValueStore, RecordFailure};
use crate::view::{derive_view, Filter, SortKey};
use crate::{Coords, Error, Result, Workout, WorkoutId, WorkoutStore};
use chrono::Utc;

/// Knobs the tracker takes from configuration
#[derive(Clone, Debug)]
pub struct TrackerSettings {
    pub zoom: u8,
    pub notice_ttl: chrono::Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            zoom: 13,
            notice_ttl: chrono::Duration::seconds(5),
        }
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        // A notice that outlives a day is never going to be seen anyway
        let ttl_secs = config.notices.ttl_secs.min(86_400) as i64;
        Self {
            zoom: config.map.zoom,
            notice_ttl: chrono::Duration::seconds(ttl_secs),
        }
    }
}

pub struct Tracker<M, K, W, G>
where
    M: MapSurface,
    K: KeyValueStore,
    W: WeatherLookup,
    G: GeocodeLookup,
{
    store: WorkoutStore,
    session: EditSession,
    markers: MarkerSync<M>,
    gateway: Gateway<K>,
    weather: W,
    geocode: G,
    notices: Notices,
    settings: TrackerSettings,
    load_failures: Vec<RecordFailure>,
    load_backup: Option<String>,
}

impl<M, K, W, G> Tracker<M, K, W, G>
where
    M: MapSurface,
    K: KeyValueStore,
    W: WeatherLookup,
    G: GeocodeLookup,
{
    /// Rehydrate from storage, draw the saved workouts and centre the map.
    ///
    /// Unreadable saved records and an unavailable start position are
    /// reported as notices; neither stops the tracker from opening.
    pub fn open<P: PositionSource>(
        map: M,
        storage: K,
        weather: W,
        geocode: G,
        position: &P,
        settings: TrackerSettings,
    ) -> Result<Self> {
        let mut gateway = Gateway::new(storage);
        let report = gateway.load()?;

        let mut tracker = Self {
            store: WorkoutStore::new(),
            session: EditSession::new(),
            markers: MarkerSync::new(map),
            gateway,
            weather,
            geocode,
            notices: Notices::new(settings.notice_ttl),
            settings,
            load_failures: Vec::new(),
            load_backup: report.backup_key,
        };

        for workout in report.workouts {
            tracker.store.add(workout.clone())?;
            tracker.markers.create_marker_for(&workout)?;
        }

        if !report.failures.is_empty() {
            let mut message = format!("{} saved workout(s) were skipped", report.failures.len());
            if let Some(key) = &tracker.load_backup {
                message.push_str(&format!(" (original kept as {})", key));
            }
            tracker
                .notices
                .raise("Some workouts could not be restored", message, Utc::now());
            tracker.load_failures = report.failures;
        }

        match position.locate() {
            Ok(center) => {
                let zoom = tracker.settings.zoom;
                tracker.markers.map_mut().set_view(center, zoom);
            }
            Err(e) => {
                tracing::warn!("No start position: {}", e);
                tracker
                    .notices
                    .raise("Location unavailable", "Couldn't get your position", Utc::now());
            }
        }

        tracing::info!("Opened workout log with {} workouts", tracker.store.len());
        Ok(tracker)
    }

    /// The map was clicked: open the form for a new workout there
    pub fn select_point(&mut self, coords: Coords) {
        self.session.select_point(coords);
    }

    /// Open the form pre-filled with a stored workout
    pub fn begin_edit(&mut self, id: &WorkoutId) -> Result<StagedInput> {
        match self.session.begin_edit(id, &self.store) {
            Ok(staged) => Ok(staged.clone()),
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Close the form without saving
    pub fn cancel(&mut self) {
        self.session.cancel();
    }

    /// Submit the form in whichever mode is active.
    ///
    /// Validation problems raise a notice and leave the store untouched.
    pub async fn submit(&mut self, input: StagedInput) -> Result<WorkoutId> {
        let change = match self
            .session
            .submit(input, &mut self.store, &self.weather, &self.geocode)
            .await
        {
            Ok(change) => change,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        let id = match change {
            Change::Added(id) => {
                let workout = self
                    .store
                    .find_by_id(&id)
                    .ok_or_else(|| Error::NotFound(id.clone()))?;
                self.markers.create_marker_for(workout)?;
                id
            }
            Change::Updated { id, relocated } => {
                if relocated {
                    let workout = self
                        .store
                        .find_by_id(&id)
                        .ok_or_else(|| Error::NotFound(id.clone()))?;
                    self.markers.replace_marker_for(workout)?;
                }
                id
            }
        };

        self.persist()?;
        Ok(id)
    }

    /// Delete one workout and its marker
    pub fn delete(&mut self, id: &WorkoutId) -> Result<Workout> {
        if self.session.editing() == Some(id) {
            self.session.cancel();
        }
        let removed = match self.store.remove(id) {
            Ok(removed) => removed,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        self.markers.remove_marker_for(id)?;
        self.persist()?;
        tracing::info!("Deleted workout {}", id);
        Ok(removed)
    }

    /// Delete every workout and erase saved state
    pub fn delete_all(&mut self) -> Result<usize> {
        self.session.cancel();
        let removed = self.store.clear();
        self.markers.clear();
        self.gateway.clear()?;
        tracing::info!("Deleted all {} workouts", removed.len());
        Ok(removed.len())
    }

    /// A workout was picked from the list: count it and centre the map on it
    pub fn select(&mut self, id: &WorkoutId) -> Result<Coords> {
        let coords = match self.store.click(id) {
            Ok(workout) => workout.coords(),
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        let zoom = self.settings.zoom;
        self.markers.map_mut().set_view(coords, zoom);
        self.persist()?;
        Ok(coords)
    }

    /// Workouts to list, filtered and ordered
    pub fn view(&self, filter: Filter, sort: SortKey) -> Vec<&Workout> {
        derive_view(&self.store, filter, sort)
    }

    pub fn store(&self) -> &WorkoutStore {
        &self.store
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn markers(&self) -> &MarkerSync<M> {
        &self.markers
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    /// Saved records skipped while opening
    pub fn load_failures(&self) -> &[RecordFailure] {
        &self.load_failures
    }

    /// Storage key holding a copy of the blob that could not be fully restored
    pub fn load_backup(&self) -> Option<&str> {
        self.load_backup.as_deref()
    }

    /// Hand back the storage, e.g. to reopen it
    pub fn into_storage(self) -> K {
        self.gateway.into_inner()
    }

    fn persist(&mut self) -> Result<()> {
        self.gateway.save(&self.store)
    }

    fn report(&mut self, error: &Error) {
        if error.is_user_correctable() {
            self.notices
                .raise("Invalid input", error.to_string(), Utc::now());
        } else {
            tracing::error!("Operation aborted: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::edit::Mode;
    use crate::lookup::tests::{paris, FixedLookups};
    use crate::lookup::FixedPosition;
    use crate::markers::tests::RecordingMap;
    use crate::storage::{MemoryStore, WORKOUTS_KEY};
    use crate::{Field, WorkoutKind};

    type TestTracker = Tracker<RecordingMap, MemoryStore, FixedLookups, FixedLookups>;

    fn lookups() -> FixedLookups {
        FixedLookups {
            temperature: Some(19.0),
            place: Some(paris()),
        }
    }

    fn open_with(storage: MemoryStore) -> TestTracker {
        crate::logging::init_test();
        Tracker::open(
            RecordingMap::default(),
            storage,
            lookups(),
            lookups(),
            &FixedPosition(Some(Coords::new(48.85, 2.35))),
            TrackerSettings::default(),
        )
        .unwrap()
    }

    fn run_input(title: &str, distance: f64) -> StagedInput {
        StagedInput {
            kind: WorkoutKind::Running,
            title: title.into(),
            distance: Some(distance),
            duration: Some(30.0),
            cadence: Some(170.0),
            ..StagedInput::default()
        }
    }

    async fn add_run(tracker: &mut TestTracker, title: &str, distance: f64) -> WorkoutId {
        tracker.select_point(Coords::new(40.0, -73.0));
        tracker.submit(run_input(title, distance)).await.unwrap()
    }

    #[test]
    fn test_open_empty_centres_map() {
        let tracker = open_with(MemoryStore::new());
        assert!(tracker.store().is_empty());
        assert_eq!(
            tracker.markers().map().view,
            Some((Coords::new(48.85, 2.35), 13))
        );
        assert!(tracker.notices().is_empty());
    }

    #[test]
    fn test_open_without_position_still_usable() {
        let tracker: TestTracker = Tracker::open(
            RecordingMap::default(),
            MemoryStore::new(),
            lookups(),
            lookups(),
            &FixedPosition(None),
            TrackerSettings::default(),
        )
        .unwrap();

        assert!(tracker.markers().map().view.is_none());
        let notice = tracker.notices().active(Utc::now()).next().unwrap();
        assert_eq!(notice.title, "Location unavailable");
    }

    #[tokio::test]
    async fn test_submit_adds_marker_and_persists() {
        let mut tracker = open_with(MemoryStore::new());
        let id = add_run(&mut tracker, "Morning run", 5.0).await;

        assert!(tracker.markers().handle_for(&id).is_some());
        assert!(tracker.markers().is_in_sync_with(tracker.store()));

        let storage = tracker.into_storage();
        let blob = storage.get(WORKOUTS_KEY).unwrap().unwrap();
        assert!(blob.contains("Morning run"));
    }

    #[tokio::test]
    async fn test_reopen_restores_workouts_and_markers() {
        let mut tracker = open_with(MemoryStore::new());
        let id = add_run(&mut tracker, "Morning run", 5.0).await;
        tracker.select(&id).unwrap();

        let reopened = open_with(tracker.into_storage());
        assert_eq!(reopened.store().len(), 1);
        let restored = reopened.store().find_by_id(&id).unwrap();
        assert_eq!(restored.clicks(), 1);
        assert_eq!(restored.location(), Some(&paris()));
        assert_eq!(reopened.markers().map().drawn.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_submit_raises_notice() {
        let mut tracker = open_with(MemoryStore::new());
        tracker.select_point(Coords::new(40.0, -73.0));

        let mut input = run_input("run", 5.0);
        input.cadence = Some(0.0);
        let result = tracker.submit(input).await;

        assert!(matches!(result, Err(Error::Validation(ref f)) if f == &vec![Field::Cadence]));
        assert!(tracker.store().is_empty());
        assert!(tracker.markers().is_empty());
        let notice = tracker.notices().active(Utc::now()).next().unwrap();
        assert!(notice.message.contains("cadence"));
    }

    #[tokio::test]
    async fn test_edit_redraws_marker_for_new_variant() {
        let mut tracker = open_with(MemoryStore::new());
        let id = add_run(&mut tracker, "Morning run", 5.0).await;
        let before = tracker.markers().handle_for(&id).unwrap();

        let mut staged = tracker.begin_edit(&id).unwrap();
        staged.kind = WorkoutKind::Cycling;
        staged.duration = Some(15.0);
        staged.elevation_gain = Some(120.0);
        let edited = tracker.submit(staged).await.unwrap();

        assert_eq!(edited, id);
        let after = tracker.markers().handle_for(&id).unwrap();
        assert_ne!(before, after);
        let spec = &tracker.markers().map().drawn[&after.0];
        assert_eq!(spec.style_class, "cycling-popup");
        assert_eq!(tracker.store().find_by_id(&id).unwrap().speed(), Some(20.0));
        assert_eq!(tracker.session().mode(), &Mode::Creating);
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let mut tracker = open_with(MemoryStore::new());
        let a = add_run(&mut tracker, "a", 5.0).await;
        add_run(&mut tracker, "b", 6.0).await;
        add_run(&mut tracker, "c", 7.0).await;

        let removed = tracker.delete(&a).unwrap();
        assert_eq!(removed.title(), "a");
        assert!(tracker.markers().is_in_sync_with(tracker.store()));
        assert!(matches!(tracker.delete(&a), Err(Error::NotFound(_))));

        assert_eq!(tracker.delete_all().unwrap(), 2);
        assert!(tracker.markers().map().drawn.is_empty());

        let storage = tracker.into_storage();
        assert!(storage.get(WORKOUTS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_edit_target_closes_session() {
        let mut tracker = open_with(MemoryStore::new());
        let id = add_run(&mut tracker, "a", 5.0).await;

        tracker.begin_edit(&id).unwrap();
        tracker.delete(&id).unwrap();
        assert_eq!(tracker.session().mode(), &Mode::Creating);
    }

    #[tokio::test]
    async fn test_markers_track_store_through_mixed_operations() {
        let mut tracker = open_with(MemoryStore::new());
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(add_run(&mut tracker, &format!("run {}", i), 1.0 + i as f64).await);
        }

        tracker.delete(&ids[1]).unwrap();
        let mut staged = tracker.begin_edit(&ids[2]).unwrap();
        staged.coords = Some(Coords::new(10.0, 10.0));
        tracker.submit(staged).await.unwrap();
        tracker.delete(&ids[4]).unwrap();
        let mut staged = tracker.begin_edit(&ids[0]).unwrap();
        staged.title = "renamed".into();
        tracker.submit(staged).await.unwrap();

        assert_eq!(tracker.store().len(), 4);
        assert!(tracker.markers().is_in_sync_with(tracker.store()));
        assert_eq!(tracker.markers().map().drawn.len(), 4);
    }

    #[test]
    fn test_partial_load_is_reported() {
        let mut storage = MemoryStore::new();
        let good = Workout::running(Coords::new(1.0, 1.0), 5.0, 30.0, 170.0, "ok").unwrap();
        let blob = serde_json::json!([
            serde_json::to_value(codec::encode(&good)).unwrap(),
            { "id": "broken", "type": "hiking" },
        ]);
        storage.set(WORKOUTS_KEY, &blob.to_string()).unwrap();

        let tracker = open_with(storage);
        assert_eq!(tracker.store().len(), 1);
        assert_eq!(tracker.markers().len(), 1);
        assert_eq!(tracker.load_failures().len(), 1);
        let notice = tracker.notices().active(Utc::now()).next().unwrap();
        assert!(notice.message.contains("1 saved workout"));
        assert!(tracker.load_backup().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_history_survives_next_submit() {
        let mut storage = MemoryStore::new();
        let original = r#"[{"id":"a","type":"running","title":"precious"},]"#;
        storage.set(WORKOUTS_KEY, original).unwrap();

        let mut tracker = open_with(storage);
        assert!(tracker.store().is_empty());
        let backup = tracker.load_backup().unwrap().to_string();
        let notice = tracker.notices().active(Utc::now()).next().unwrap();
        assert!(notice.message.contains(&backup));

        add_run(&mut tracker, "fresh", 5.0).await;

        let storage = tracker.into_storage();
        assert!(storage.get(WORKOUTS_KEY).unwrap().unwrap().contains("fresh"));
        assert_eq!(storage.get(&backup).unwrap().as_deref(), Some(original));
    }

    #[tokio::test]
    async fn test_out_of_range_point_is_rejected() {
        let mut tracker = open_with(MemoryStore::new());
        tracker.select_point(Coords::new(1000.0, -5000.0));

        let result = tracker.submit(run_input("lost", 5.0)).await;

        assert!(matches!(result, Err(Error::Validation(ref f)) if f == &vec![Field::Coords]));
        assert!(tracker.store().is_empty());
        assert!(tracker.markers().is_empty());
        assert!(tracker.into_storage().get(WORKOUTS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_view_and_select() {
        let mut tracker = open_with(MemoryStore::new());
        add_run(&mut tracker, "long", 10.0).await;
        let short = add_run(&mut tracker, "short", 3.0).await;

        let titles: Vec<_> = tracker
            .view(Filter::All, SortKey::DistanceAsc)
            .iter()
            .map(|w| w.title().to_string())
            .collect();
        assert_eq!(titles, vec!["short", "long"]);

        let coords = tracker.select(&short).unwrap();
        assert_eq!(tracker.markers().map().view, Some((coords, 13)));
        assert!(tracker.select(&WorkoutId::from("missing")).is_err());
    }
}
