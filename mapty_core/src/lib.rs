#![forbid(unsafe_code)]

//! Core domain model and business logic for Mapty, a map-based workout log.
//!
//! This crate provides:
//! - Domain types (running and cycling workouts with derived metrics)
//! - The in-memory workout store and its filtered/sorted views
//! - The create/edit session and async weather/geocode enrichment
//! - Map marker reconciliation behind the `MapSurface` trait
//! - Persistence (key-value storage, JSON codec, CSV export)

pub mod types;
pub mod error;
pub mod codec;
pub mod config;
pub mod logging;
pub mod store;
pub mod view;
pub mod edit;
pub mod markers;
pub mod storage;
pub mod lookup;
pub mod notice;
pub mod export;
pub mod tracker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::WorkoutStore;
pub use view::{derive_view, Filter, SortKey};
pub use edit::{Change, EditSession, Mode, StagedInput};
pub use markers::{MapSurface, MarkerHandle, MarkerSpec, MarkerSync};
pub use storage::{FileStore, Gateway, KeyValueStore, LoadReport, MemoryStore};
pub use lookup::{
    Enrichment, FixedPosition, GeocodeLookup, HttpGeocoder, HttpWeather, PositionSource,
    RegionRemap, WeatherLookup,
};
pub use notice::{Notice, Notices};
pub use export::export_csv;
pub use tracker::{Tracker, TrackerSettings};
