use clap::{Args, Parser, Subcommand};
use mapty_core::codec;
use mapty_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mapty")]
#[command(about = "Map-based running and cycling log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip weather and geocoding lookups
    #[arg(long, global = true)]
    offline: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a new workout at a point
    Add {
        /// Workout type (running, cycling)
        #[arg(long, default_value = "running")]
        kind: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        #[command(flatten)]
        measurements: Measurements,

        #[arg(long)]
        title: String,
    },

    /// Change a stored workout
    Edit {
        id: String,

        /// Switch the workout type (running, cycling)
        #[arg(long)]
        kind: Option<String>,

        /// Move the workout (requires --lng)
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Move the workout (requires --lat)
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,

        #[command(flatten)]
        measurements: Measurements,

        #[arg(long)]
        title: Option<String>,
    },

    /// Delete one workout
    Delete { id: String },

    /// Delete every workout
    Reset,

    /// Centre the map on a workout
    Select { id: String },

    /// List workouts
    List {
        /// all, running or cycling
        #[arg(long, default_value = "all", value_parser = str::parse::<Filter>)]
        filter: Filter,

        /// insertion, distance or duration
        #[arg(long, default_value = "insertion", value_parser = str::parse::<SortKey>)]
        sort: SortKey,

        /// Print stored records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write all workouts to a CSV file
    Export { path: PathBuf },
}

#[derive(Args)]
struct Measurements {
    /// Distance in km
    #[arg(long, allow_hyphen_values = true)]
    distance: Option<f64>,

    /// Duration in minutes
    #[arg(long, allow_hyphen_values = true)]
    duration: Option<f64>,

    /// Steps per minute (running)
    #[arg(long, allow_hyphen_values = true)]
    cadence: Option<f64>,

    /// Elevation gain in metres (cycling)
    #[arg(long, allow_hyphen_values = true)]
    elevation: Option<f64>,
}

/// Map surface for a terminal session: markers are tracked, not drawn
#[derive(Default)]
struct ConsoleMap {
    next: u64,
}

impl MapSurface for ConsoleMap {
    fn place_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle {
        self.next += 1;
        tracing::debug!("Marker #{} at {}: {}", self.next, spec.coords, spec.popup);
        MarkerHandle(self.next)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        tracing::debug!("Removed marker #{}", handle.0);
    }

    fn set_view(&mut self, center: Coords, zoom: u8) {
        tracing::debug!("Map view {} (zoom {})", center, zoom);
    }
}

type CliTracker = Tracker<ConsoleMap, FileStore, Option<HttpWeather>, Option<HttpGeocoder>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    mapty_core::logging::init_with_level(mapty_core::logging::level_for_verbosity(cli.verbose));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    let mut tracker = open_tracker(&config, data_dir, cli.offline)?;
    let outcome = run(&mut tracker, cli.command).await;

    // Notices raised while running (skipped records, invalid input)
    for notice in tracker.notices().active(chrono::Utc::now()) {
        eprintln!("! {}: {}", notice.title, notice.message);
    }

    outcome
}

fn open_tracker(config: &Config, data_dir: PathBuf, offline: bool) -> Result<CliTracker> {
    let (weather, geocode) = if offline || !config.lookups.enabled {
        tracing::info!("Lookups disabled");
        (None, None)
    } else {
        let remap = RegionRemap::new(config.geocoding.region_overrides.clone());
        (
            Some(HttpWeather::new(&config.lookups)?),
            Some(HttpGeocoder::new(&config.lookups, remap)?),
        )
    };

    Tracker::open(
        ConsoleMap::default(),
        FileStore::new(data_dir),
        weather,
        geocode,
        &FixedPosition(config.map.home),
        TrackerSettings::from(config),
    )
}

async fn run(tracker: &mut CliTracker, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            kind,
            lat,
            lng,
            measurements,
            title,
        } => {
            let input = StagedInput {
                kind: kind.parse()?,
                title,
                distance: measurements.distance,
                duration: measurements.duration,
                cadence: measurements.cadence,
                elevation_gain: measurements.elevation,
                coords: None,
            };
            tracker.select_point(Coords::new(lat, lng));
            let id = tracker.submit(input).await?;
            print_saved("Added", tracker, &id);
        }

        Commands::Edit {
            id,
            kind,
            lat,
            lng,
            measurements,
            title,
        } => {
            let id = WorkoutId::from(id);
            let mut input = tracker.begin_edit(&id)?;
            if let Some(kind) = kind {
                input.kind = kind.parse()?;
            }
            if let (Some(lat), Some(lng)) = (lat, lng) {
                input.coords = Some(Coords::new(lat, lng));
            }
            if let Some(title) = title {
                input.title = title;
            }
            input.distance = measurements.distance.or(input.distance);
            input.duration = measurements.duration.or(input.duration);
            input.cadence = measurements.cadence.or(input.cadence);
            input.elevation_gain = measurements.elevation.or(input.elevation_gain);

            let id = tracker.submit(input).await?;
            print_saved("Updated", tracker, &id);
        }

        Commands::Delete { id } => {
            let removed = tracker.delete(&WorkoutId::from(id))?;
            println!("✓ Deleted {}", removed.description());
        }

        Commands::Reset => {
            let count = tracker.delete_all()?;
            println!("✓ Deleted {} workouts", count);
        }

        Commands::Select { id } => {
            let coords = tracker.select(&WorkoutId::from(id))?;
            println!("Centred map on {}", coords);
        }

        Commands::List { filter, sort, json } => {
            let workouts = tracker.view(filter, sort);

            if json {
                let records: Vec<_> = workouts.iter().map(|w| codec::encode(w)).collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if workouts.is_empty() {
                println!("No workouts logged yet.");
            } else {
                for workout in workouts {
                    println!("{}", format_row(workout));
                }
            }
        }

        Commands::Export { path } => {
            let count = mapty_core::export_csv(&path, tracker.store().iter())?;
            println!("✓ Exported {} workouts to {}", count, path.display());
        }
    }

    Ok(())
}

fn print_saved(verb: &str, tracker: &CliTracker, id: &WorkoutId) {
    println!("✓ {} workout {}", verb, id);
    if let Some(workout) = tracker.store().find_by_id(id) {
        println!("  {}", format_row(workout));
    }
}

fn format_row(workout: &Workout) -> String {
    let mut row = format!(
        "{} {}  {} km  {} min",
        workout.kind().icon(),
        workout.description(),
        workout.distance(),
        workout.duration()
    );

    match workout.discipline() {
        Discipline::Running { cadence } => {
            if let Some(pace) = workout.pace() {
                row.push_str(&format!("  {:.1} min/km", pace));
            }
            row.push_str(&format!("  {} spm", cadence));
        }
        Discipline::Cycling { elevation_gain } => {
            if let Some(speed) = workout.speed() {
                row.push_str(&format!("  {:.1} km/h", speed));
            }
            row.push_str(&format!("  {} m", elevation_gain));
        }
    }

    if let Some(place) = workout.location() {
        row.push_str(&format!("  {}, {}", place.city, place.country));
    }
    if let Some(temperature) = workout.temperature() {
        row.push_str(&format!("  {:.1}°C", temperature));
    }

    format!("{}  \"{}\"  [{}]", row, workout.title(), workout.id())
}
