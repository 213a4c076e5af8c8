//! Parameter grids and the experiment sweep runner.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::composer::RouteComposer;
use crate::config::ExperimentConfig;
use crate::demand::DemandColumn;
use crate::error::{PlannerError, Result};
use crate::location::Location;
use crate::matrix::DistanceMatrix;
use crate::output::{self, RunMetadata, SweepDirectory};
use crate::summary::{summarize, SummaryTable};
use crate::traits::RoutingSolver;

/// Parameters of a single solver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Demand figure routed against.
    pub demand_column: DemandColumn,
    /// Maximum number of vehicles available.
    pub num_vehicles: u32,
    /// Maximum number of items a vehicle carries at once.
    pub vehicle_capacity: u32,
    /// Wall-clock budget for the solver, in seconds.
    pub runtime_seconds: u32,
}

/// An inclusive integer range walked in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    min: u32,
    max: u32,
    step: u32,
}

impl Range {
    pub fn new(field: &str, min: u32, max: u32, step: u32) -> Result<Self> {
        if step == 0 {
            return Err(PlannerError::InvalidRange {
                field: field.to_string(),
                message: "step must be positive".to_string(),
            });
        }
        if min > max {
            return Err(PlannerError::InvalidRange {
                field: field.to_string(),
                message: format!("min {min} exceeds max {max}"),
            });
        }
        Ok(Self { min, max, step })
    }

    /// A range holding exactly one value.
    pub fn fixed(value: u32) -> Self {
        Self { min: value, max: value, step: 1 }
    }

    /// `min, min + step, ...` up to and including `max` when it falls on a step.
    pub fn values(&self) -> Vec<u32> {
        (self.min..=self.max).step_by(self.step as usize).collect()
    }

    /// Number of values in the range.
    pub fn count(&self) -> usize {
        ((self.max - self.min) / self.step) as usize + 1
    }
}

/// A grid of simulation parameters for one stage of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSweep {
    pub name: String,
    pub demand_column: DemandColumn,
    pub num_vehicles: Range,
    pub vehicle_capacity: Range,
    pub simulation_runtime: Range,
}

impl ParameterSweep {
    /// Lazily yield every parameter combination: runtime outermost, then
    /// vehicle count, then capacity. Each call starts a fresh pass.
    pub fn simulation_params(&self) -> impl Iterator<Item = SimulationParams> + '_ {
        let demand_column = self.demand_column;
        self.simulation_runtime.values().into_iter().flat_map(move |runtime_seconds| {
            self.num_vehicles.values().into_iter().flat_map(move |num_vehicles| {
                self.vehicle_capacity
                    .values()
                    .into_iter()
                    .map(move |vehicle_capacity| SimulationParams {
                        demand_column,
                        num_vehicles,
                        vehicle_capacity,
                        runtime_seconds,
                    })
            })
        })
    }

    /// Number of combinations in the grid.
    pub fn count(&self) -> usize {
        self.simulation_runtime.count() * self.num_vehicles.count() * self.vehicle_capacity.count()
    }
}

/// One persisted run of an experiment.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    #[serde(rename = "simulation")]
    pub metadata: RunMetadata,
    #[serde(rename = "results")]
    pub summary: Option<SummaryTable>,
    #[serde(skip)]
    pub directory: PathBuf,
}

/// Everything a finished sweep produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    /// Shared by every sweep of the experiment.
    pub experiment_dir: PathBuf,
    /// This sweep's directory, holding its runs and `summary_stats.json`.
    pub sweep_dir: PathBuf,
    pub runs: Vec<RunRecord>,
    /// True when the sweep deadline stopped new runs from starting.
    pub stopped_early: bool,
}

/// Instant after which no new run starts. `None` when there is no budget or
/// the budget reaches past what `Instant` can represent.
fn sweep_deadline(start: Instant, max_sweep_seconds: Option<u64>) -> Option<Instant> {
    max_sweep_seconds.and_then(|seconds| start.checked_add(Duration::from_secs(seconds)))
}

/// Runs every (pickup, combined) parameter pairing of an experiment.
pub struct SweepRunner<'a, S: RoutingSolver + ?Sized> {
    solver: &'a S,
    config: &'a ExperimentConfig,
}

impl<'a, S: RoutingSolver + ?Sized> SweepRunner<'a, S> {
    pub fn new(solver: &'a S, config: &'a ExperimentConfig) -> Self {
        Self { solver, config }
    }

    pub fn run(&self, locations: &[Location], matrix: &DistanceMatrix) -> Result<ExperimentSummary> {
        matrix.ensure_dimension(locations.len())?;

        let config = self.config;
        let experiment_dir = config.output_dir.join(output::experiment_slug(&config.name));
        let deadline = sweep_deadline(Instant::now(), config.max_sweep_seconds);
        let sweep_dir = SweepDirectory::create(&experiment_dir, Timestamp::now())?;
        sweep_dir.write_summary_stats(&[])?;
        let composer = RouteComposer::new(self.solver).with_parallel(config.parallel);

        info!(
            experiment = %config.name,
            dir = %sweep_dir.path().display(),
            pickup_combinations = config.pickups_only.count(),
            combined_combinations = config.pickups_and_dropoffs.count(),
            "starting parameter sweep"
        );

        let mut runs = Vec::new();
        let mut stopped_early = false;

        'sweep: for pickup_params in config.pickups_only.simulation_params() {
            for combo_params in config.pickups_and_dropoffs.simulation_params() {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    warn!(completed = runs.len(), "sweep time budget spent; not starting more runs");
                    stopped_early = true;
                    break 'sweep;
                }

                let started_at = Timestamp::now();
                let directory = sweep_dir.create_run(runs.len())?;
                info!(run = runs.len(), dir = %directory.path().display(), "executing simulation");

                let report = composer.compose(locations, matrix, &pickup_params, &combo_params)?;
                let finished_at = Timestamp::now();

                let metadata = RunMetadata {
                    name: config.name.clone(),
                    kind: output::RUN_KIND.to_string(),
                    started_at,
                    finished_at,
                    solver: self.solver.name().to_string(),
                    status: report.state,
                    num_routes: report.route_count(),
                    stage_one_routes: report
                        .stage_one
                        .as_ref()
                        .map(|assignment| assignment.routes.len())
                        .unwrap_or(0),
                    skipped_routes: report.skipped_route_ids(),
                    pickup_params,
                    combo_params,
                };

                let summary = if report.is_stage_one_infeasible() {
                    None
                } else {
                    directory.write_routes(&report, locations)?;
                    let table = summarize(report.combined_routes(), locations);
                    Some(match config.estimate_multipliers {
                        Some(multipliers) => table.with_multipliers(multipliers),
                        None => table,
                    })
                };
                directory.write_metadata(&metadata)?;

                info!(routes = metadata.num_routes, "simulation complete");
                runs.push(RunRecord {
                    metadata,
                    summary,
                    directory: directory.path().to_path_buf(),
                });
                sweep_dir.write_summary_stats(&runs)?;
            }
        }

        let summary = ExperimentSummary {
            experiment_dir,
            sweep_dir: sweep_dir.path().to_path_buf(),
            runs,
            stopped_early,
        };
        info!(runs = summary.runs.len(), "parameter sweep complete");
        Ok(summary)
    }
}
