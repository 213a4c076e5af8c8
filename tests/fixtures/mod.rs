//! Test fixtures for tote-planner.
//!
//! Provides realistic test data including:
//! - Real Las Vegas / Henderson locations with tote demand
//! - Small synthetic locations and matrices
//! - Deterministic stub solvers

#![allow(dead_code)]

pub mod las_vegas_locations;

pub use las_vegas_locations::*;

use tote_planner::demand::{DemandColumn, NodeRef};
use tote_planner::location::Location;
use tote_planner::matrix::DistanceMatrix;
use tote_planner::solver::InsertionSolver;
use tote_planner::sweep::SimulationParams;
use tote_planner::traits::{RouteAssignment, RoutingProblem, RoutingSolver};

pub fn location(index: usize, pickup: u32, dropoff: u32) -> Location {
    Location {
        index,
        name: format!("stop {index}"),
        latitude: 36.0,
        longitude: -115.0 + index as f64 * 0.01,
        address: format!("{index} Test Ave"),
        pickup_demand: pickup,
        dropoff_demand: dropoff,
        location_type: "restaurant".to_string(),
        pickup_type: "daily".to_string(),
    }
}

/// Locations with the given pickup and dropoff counts; index 0 is the depot.
pub fn locations(pickups: &[u32], dropoffs: &[u32]) -> Vec<Location> {
    pickups
        .iter()
        .zip(dropoffs)
        .enumerate()
        .map(|(index, (&pickup, &dropoff))| location(index, pickup, dropoff))
        .collect()
}

/// Locations on a line, 100m apart.
pub fn line_matrix(size: usize) -> DistanceMatrix {
    let rows = (0..size)
        .map(|i| (0..size).map(|j| (i.abs_diff(j) * 100) as f64).collect())
        .collect();
    DistanceMatrix::from_rows(rows).unwrap()
}

pub fn pickup_params(num_vehicles: u32, vehicle_capacity: u32) -> SimulationParams {
    SimulationParams {
        demand_column: DemandColumn::Pickup,
        num_vehicles,
        vehicle_capacity,
        runtime_seconds: 5,
    }
}

pub fn combo_params(num_vehicles: u32, vehicle_capacity: u32) -> SimulationParams {
    SimulationParams {
        demand_column: DemandColumn::Signed,
        num_vehicles,
        vehicle_capacity,
        runtime_seconds: 5,
    }
}

/// Stage-one problems are routed against the pickup column.
fn is_stage_one(params: &SimulationParams) -> bool {
    params.demand_column == DemandColumn::Pickup
}

/// Deterministic solver with scripted behaviour.
///
/// - `stage_one`: fixed stage-one visiting orders (node indices); `None`
///   delegates to the insertion solver.
/// - `refuse`: stage-two problems containing a pickup for one of these
///   locations are reported infeasible.
#[derive(Debug, Default)]
pub struct ScriptedSolver {
    pub stage_one: Option<Vec<Vec<usize>>>,
    pub refuse: Vec<usize>,
    pub inner: InsertionSolver,
}

impl ScriptedSolver {
    pub fn with_stage_one(sequences: Vec<Vec<usize>>) -> Self {
        Self {
            stage_one: Some(sequences),
            ..Self::default()
        }
    }

    pub fn refusing(mut self, location: usize) -> Self {
        self.refuse.push(location);
        self
    }
}

impl RoutingSolver for ScriptedSolver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn solve(&self, problem: &RoutingProblem, params: &SimulationParams) -> Option<RouteAssignment> {
        if is_stage_one(params) {
            if let Some(sequences) = &self.stage_one {
                return Some(RouteAssignment::from_sequences(problem, sequences));
            }
        } else if self
            .refuse
            .iter()
            .any(|&location| problem.nodes.contains(&NodeRef::pickup(location)))
        {
            return None;
        }
        self.inner.solve(problem, params)
    }
}

/// A solver that never finds a route.
#[derive(Debug, Default)]
pub struct NeverSolver;

impl RoutingSolver for NeverSolver {
    fn name(&self) -> &str {
        "never"
    }

    fn solve(&self, _problem: &RoutingProblem, _params: &SimulationParams) -> Option<RouteAssignment> {
        None
    }
}

/// Install a test-writer subscriber so `tracing` output shows on failure.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tote_planner=debug")),
        )
        .with_test_writer()
        .try_init();
}
