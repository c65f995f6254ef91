//! Display ordering for the workout list.
//!
//! [`derive_view`] is a pure function of the store and the two selectors:
//! filter first (store order preserved), then a stable sort so equal keys
//! keep their insertion order.

use crate::{Error, Result, Workout, WorkoutKind, WorkoutStore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which workouts to show
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    All,
    RunningOnly,
    CyclingOnly,
}

impl Filter {
    pub fn matches(self, workout: &Workout) -> bool {
        match self {
            Filter::All => true,
            Filter::RunningOnly => workout.kind() == WorkoutKind::Running,
            Filter::CyclingOnly => workout.kind() == WorkoutKind::Cycling,
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "running" | "run" => Ok(Filter::RunningOnly),
            "cycling" | "ride" => Ok(Filter::CyclingOnly),
            other => Err(Error::UnknownChoice {
                what: "filter",
                value: other.to_string(),
            }),
        }
    }
}

/// How to order the filtered workouts
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    InsertionOrder,
    DistanceAsc,
    DurationAsc,
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "insertion" | "none" | "created" => Ok(SortKey::InsertionOrder),
            "distance" => Ok(SortKey::DistanceAsc),
            "duration" => Ok(SortKey::DurationAsc),
            other => Err(Error::UnknownChoice {
                what: "sort key",
                value: other.to_string(),
            }),
        }
    }
}

/// Select and order workouts for display without touching the store
pub fn derive_view(store: &WorkoutStore, filter: Filter, sort: SortKey) -> Vec<&Workout> {
    let mut view: Vec<&Workout> = store.iter().filter(|w| filter.matches(w)).collect();

    // `sort_by` is stable, which is what keeps ties in insertion order.
    match sort {
        SortKey::InsertionOrder => {}
        SortKey::DistanceAsc => view.sort_by(|a, b| a.distance().total_cmp(&b.distance())),
        SortKey::DurationAsc => view.sort_by(|a, b| a.duration().total_cmp(&b.duration())),
    }

    view
}
