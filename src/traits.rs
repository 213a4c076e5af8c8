//! Core seams of the planner.
//!
//! The routing solver and the distance source are external capabilities;
//! the decomposition engine only talks to them through these traits.

use serde::Serialize;

use crate::demand::NodeRef;
use crate::error::Result;
use crate::matrix::DistanceMatrix;
use crate::sweep::SimulationParams;

/// A solver-ready problem: nodes, distances between them, and one demand
/// per node. Node 0 is always the depot.
#[derive(Debug, Clone)]
pub struct RoutingProblem {
    pub nodes: Vec<NodeRef>,
    pub demands: Vec<i64>,
    pub distances: DistanceMatrix,
}

impl RoutingProblem {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Demand balance carried by the depot node.
    pub fn depot_demand(&self) -> i64 {
        self.demands.first().copied().unwrap_or(0)
    }
}

/// A stop on a vehicle route, indexed into the problem's nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStop {
    pub node: usize,
    pub cumulative_distance: f64,
    pub cumulative_load: i64,
}

/// One vehicle's route, starting and ending at the depot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRoute {
    pub vehicle: usize,
    pub stops: Vec<RouteStop>,
}

impl VehicleRoute {
    /// Build a route from the visiting order of non-depot nodes.
    ///
    /// The load starts at zero when leaving the depot and accumulates each
    /// stop's demand; the depot's own demand is not applied.
    pub fn from_sequence(problem: &RoutingProblem, vehicle: usize, sequence: &[usize]) -> Self {
        let mut stops = Vec::with_capacity(sequence.len() + 2);
        let mut distance = 0.0;
        let mut load = 0i64;
        let mut previous = 0usize;

        stops.push(RouteStop { node: 0, cumulative_distance: 0.0, cumulative_load: 0 });
        for &node in sequence {
            distance += problem.distances.get(previous, node);
            load += problem.demands[node];
            stops.push(RouteStop { node, cumulative_distance: distance, cumulative_load: load });
            previous = node;
        }
        distance += problem.distances.get(previous, 0);
        stops.push(RouteStop { node: 0, cumulative_distance: distance, cumulative_load: load });

        Self { vehicle, stops }
    }

    pub fn distance(&self) -> f64 {
        self.stops.last().map(|stop| stop.cumulative_distance).unwrap_or(0.0)
    }

    /// Nodes visited between the two depot stops.
    pub fn visits(&self) -> impl Iterator<Item = usize> + '_ {
        let inner = self.stops.len().saturating_sub(2);
        self.stops.iter().skip(1).take(inner).map(|stop| stop.node)
    }

    /// True when every running load lies in `[0, capacity]`.
    pub fn within_capacity(&self, capacity: i64) -> bool {
        self.stops
            .iter()
            .all(|stop| (0..=capacity).contains(&stop.cumulative_load))
    }
}

/// A solver result: one route per used vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAssignment {
    pub routes: Vec<VehicleRoute>,
}

impl RouteAssignment {
    /// Build an assignment from per-vehicle visiting orders, dropping
    /// vehicles that visit nothing.
    pub fn from_sequences(problem: &RoutingProblem, sequences: &[Vec<usize>]) -> Self {
        let routes = sequences
            .iter()
            .enumerate()
            .filter(|(_, sequence)| !sequence.is_empty())
            .map(|(vehicle, sequence)| VehicleRoute::from_sequence(problem, vehicle, sequence))
            .collect();
        Self { routes }
    }

    pub fn total_distance(&self) -> f64 {
        self.routes.iter().map(VehicleRoute::distance).sum()
    }
}

/// An external capacitated vehicle routing solver.
///
/// Contract:
/// - loads are a running sum with zero slack, bounded by `[0, capacity]`;
/// - the load is zero when leaving the depot and the depot's demand entry
///   is not accumulated;
/// - `None` means no feasible assignment within `params.runtime_seconds`,
///   which includes running out of time;
/// - results are the best found, not necessarily optimal, and may differ
///   between calls with identical input unless the adapter says otherwise.
pub trait RoutingSolver: Send + Sync {
    /// Name recorded in run metadata.
    fn name(&self) -> &str;

    fn solve(&self, problem: &RoutingProblem, params: &SimulationParams) -> Option<RouteAssignment>;
}

/// Provides a distance matrix for a set of locations.
///
/// The matrix is indexed by the provided location order.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<Vec<Vec<f64>>>;
}
