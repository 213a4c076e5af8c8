//! Persistence of experiment runs.
//!
//! Layout: `{output_dir}/{experiment}/{sweep}/run-{NNNN}/`. Every sweep and
//! every run gets its own freshly created directory, so a crash or a later
//! sweep never touches runs that already finished. A run's `metadata.json`
//! is written last and marks the run as complete.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::Serialize;

use crate::composer::{CombinedRoute, CompositionReport, CompositionState};
use crate::demand::Role;
use crate::error::Result;
use crate::location::Location;
use crate::sweep::{RunRecord, SimulationParams};

pub const RUN_KIND: &str = "Multi-Stage Simulation";
pub const METADATA_FILE: &str = "metadata.json";
pub const ROUTES_FILE: &str = "routes.csv";
pub const ROUTES_TEXT_FILE: &str = "routes.txt";
pub const SUMMARY_FILE: &str = "summary_stats.json";

/// Metadata recorded for every run, feasible or not.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub name: String,
    pub kind: String,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub solver: String,
    pub status: CompositionState,
    pub num_routes: usize,
    pub stage_one_routes: usize,
    pub skipped_routes: Vec<usize>,
    pub pickup_params: SimulationParams,
    pub combo_params: SimulationParams,
}

/// One row of the route output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRow<'a> {
    pub original_index: usize,
    pub route_id: &'a str,
    pub stop_number: usize,
    pub role: Role,
    pub cumulative_distance: f64,
    pub cumulative_load: i64,
    pub name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub address: &'a str,
    pub pickup_demand: u32,
    pub dropoff_demand: u32,
    pub location_type: &'a str,
    pub pickup_type: &'a str,
}

/// Flatten combined routes into output rows, stops numbered from 1.
pub fn route_rows<'a>(
    routes: impl IntoIterator<Item = &'a CombinedRoute>,
    locations: &'a [Location],
) -> Vec<RouteRow<'a>> {
    routes
        .into_iter()
        .flat_map(move |route| {
            route.stops.iter().enumerate().map(move |(i, stop)| {
                let location = &locations[stop.node.location];
                RouteRow {
                    original_index: stop.node.location,
                    route_id: &route.id,
                    stop_number: i + 1,
                    role: stop.node.role,
                    cumulative_distance: stop.cumulative_distance,
                    cumulative_load: stop.cumulative_load,
                    name: &location.name,
                    latitude: location.latitude,
                    longitude: location.longitude,
                    address: &location.address,
                    pickup_demand: location.pickup_demand,
                    dropoff_demand: location.dropoff_demand,
                    location_type: &location.location_type,
                    pickup_type: &location.pickup_type,
                }
            })
        })
        .collect()
}

/// Plain-text diagram of a route: `Node(i) Load(l) -> ...` with its
/// distance and starting load.
pub fn render_route(route: &CombinedRoute) -> String {
    let legs: Vec<String> = route
        .stops
        .iter()
        .map(|stop| match stop.node.role {
            Role::Dropoff => format!("Drop({}) Load({})", stop.node.location, stop.cumulative_load),
            _ => format!("Node({}) Load({})", stop.node.location, stop.cumulative_load),
        })
        .collect();
    let starting_load = route.stops.first().map(|stop| stop.cumulative_load).unwrap_or(0);

    format!(
        "Route #{}:\nDistance of the route: {:.0}m\nLoad of the route: {}\n{}",
        route.id,
        route.distance(),
        starting_load,
        legs.join(" -> \n")
    )
}

/// Directory name for an experiment: lowercase words joined by `_`.
pub fn experiment_slug(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// One sweep's output directory: its run directories and `summary_stats.json`.
#[derive(Debug, Clone)]
pub struct SweepDirectory {
    path: PathBuf,
}

impl SweepDirectory {
    /// Create `{experiment_dir}/{YYYYmmddHHMMSS}`, suffixed `-1`, `-2`, ...
    /// when a sweep started in the same second already owns the name.
    pub fn create(experiment_dir: &Path, started_at: Timestamp) -> Result<Self> {
        fs::create_dir_all(experiment_dir)?;
        let stamp = started_at.strftime("%Y%m%d%H%M%S").to_string();

        let mut attempt = 0usize;
        loop {
            let name = match attempt {
                0 => stamp.clone(),
                n => format!("{stamp}-{n}"),
            };
            let path = experiment_dir.join(name);
            match fs::create_dir(&path) {
                Ok(()) => return Ok(Self { path }),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory for run number `run` of this sweep.
    pub fn create_run(&self, run: usize) -> Result<RunDirectory> {
        RunDirectory::create(&self.path, run)
    }

    /// Replace the sweep's `summary_stats.json` with `runs`.
    ///
    /// The record is staged next to the target and renamed into place, so a
    /// failed write leaves the previous record readable.
    pub fn write_summary_stats(&self, runs: &[RunRecord]) -> Result<()> {
        let staged = self.path.join(format!("{SUMMARY_FILE}.tmp"));
        write_json(&staged, runs)?;
        fs::rename(&staged, self.path.join(SUMMARY_FILE))?;
        Ok(())
    }
}

/// A run's output directory.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create `{sweep_dir}/run-{run:04}`.
    ///
    /// Fails if the directory already exists.
    pub fn create(sweep_dir: &Path, run: usize) -> Result<Self> {
        let path = sweep_dir.join(format!("run-{run:04}"));
        fs::create_dir(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `metadata.json`. Call once everything else for the run is on disk.
    pub fn write_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        write_json(&self.path.join(METADATA_FILE), metadata)
    }

    /// Write the route table and its plain-text rendering.
    pub fn write_routes(&self, report: &CompositionReport, locations: &[Location]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path.join(ROUTES_FILE))?;
        for row in route_rows(report.combined_routes(), locations) {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let text: Vec<String> = report.combined_routes().map(render_route).collect();
        let mut file = BufWriter::new(File::create(self.path.join(ROUTES_TEXT_FILE))?);
        file.write_all(text.join("\n\n").as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
