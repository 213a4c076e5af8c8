//! Bundled routing solver adapters.
//!
//! Two heuristics sit behind [`RoutingSolver`]: cheapest insertion with
//! local search, and a greedy nearest-neighbour builder. Configuration picks
//! one through [`SolverKind`].

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sweep::SimulationParams;
use crate::traits::{RouteAssignment, RoutingProblem, RoutingSolver};

/// Minimum distance gain for a local search move to count as an improvement.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Which bundled adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    #[default]
    Insertion,
    NearestNeighbor,
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Maximum passes of the local search improvement phase.
    pub local_search_iterations: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            local_search_iterations: 100,
        }
    }
}

/// A configured solver adapter.
#[derive(Debug, Clone)]
pub enum SolverAdapter {
    Insertion(InsertionSolver),
    NearestNeighbor(NearestNeighborSolver),
}

impl SolverAdapter {
    pub fn from_kind(kind: SolverKind) -> Self {
        match kind {
            SolverKind::Insertion => SolverAdapter::Insertion(InsertionSolver::default()),
            SolverKind::NearestNeighbor => SolverAdapter::NearestNeighbor(NearestNeighborSolver),
        }
    }
}

impl RoutingSolver for SolverAdapter {
    fn name(&self) -> &str {
        match self {
            SolverAdapter::Insertion(solver) => solver.name(),
            SolverAdapter::NearestNeighbor(solver) => solver.name(),
        }
    }

    fn solve(&self, problem: &RoutingProblem, params: &SimulationParams) -> Option<RouteAssignment> {
        match self {
            SolverAdapter::Insertion(solver) => solver.solve(problem, params),
            SolverAdapter::NearestNeighbor(solver) => solver.solve(problem, params),
        }
    }
}

/// Wall-clock budget for one solver call.
#[derive(Debug, Clone, Copy)]
struct Deadline(Instant);

impl Deadline {
    fn after_secs(seconds: u32) -> Self {
        Self(Instant::now() + Duration::from_secs(u64::from(seconds)))
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

// ============================================================================
// Cheapest insertion + local search
// ============================================================================

/// Cheapest feasible insertion followed by 2-opt and relocate moves.
///
/// Deterministic as long as local search converges before the deadline.
#[derive(Debug, Clone, Default)]
pub struct InsertionSolver {
    options: SolveOptions,
}

#[derive(Debug, Clone, Default)]
struct RouteState {
    visits: Vec<usize>,
    distance: f64,
}

impl InsertionSolver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }
}

impl RoutingSolver for InsertionSolver {
    fn name(&self) -> &str {
        "insertion"
    }

    fn solve(&self, problem: &RoutingProblem, params: &SimulationParams) -> Option<RouteAssignment> {
        debug_assert_eq!(problem.nodes.len(), problem.demands.len());
        debug_assert_eq!(problem.nodes.len(), problem.distances.size());

        let deadline = Deadline::after_secs(params.runtime_seconds);
        let capacity = i64::from(params.vehicle_capacity);

        if problem.len() <= 1 {
            return Some(RouteAssignment { routes: Vec::new() });
        }
        if params.num_vehicles == 0 {
            return None;
        }

        let mut routes = vec![RouteState::default(); params.num_vehicles as usize];

        for node in insertion_order(problem) {
            let (route_index, position, delta) = best_insertion(problem, &routes, node, capacity)?;
            let route = &mut routes[route_index];
            route.visits.insert(position, node);
            route.distance += delta;

            if deadline.expired() {
                debug!(node, "insertion construction ran out of time");
                return None;
            }
        }

        local_search(problem, &mut routes, capacity, &self.options, &deadline);

        let sequences: Vec<Vec<usize>> = routes.into_iter().map(|route| route.visits).collect();
        let assignment = RouteAssignment::from_sequences(problem, &sequences);
        debug!(
            routes = assignment.routes.len(),
            distance = assignment.total_distance(),
            "insertion solver finished"
        );
        Some(assignment)
    }
}

/// Pickups first (largest first), then zero-demand nodes, then dropoffs
/// (largest first).
fn insertion_order(problem: &RoutingProblem) -> Vec<usize> {
    let mut order: Vec<usize> = (1..problem.len()).collect();
    order.sort_by_key(|&node| {
        let demand = problem.demands[node];
        let class = match demand {
            d if d > 0 => 0,
            0 => 1,
            _ => 2,
        };
        (class, Reverse(demand.abs()), node)
    });
    order
}

/// Find the cheapest feasible (route, position, distance delta) for `node`.
fn best_insertion(
    problem: &RoutingProblem,
    routes: &[RouteState],
    node: usize,
    capacity: i64,
) -> Option<(usize, usize, f64)> {
    let demand = problem.demands[node];
    let mut best: Option<(usize, usize, f64)> = None;

    for (route_index, route) in routes.iter().enumerate() {
        let loads = running_loads(problem, &route.visits);
        let (suffix_min, suffix_max) = suffix_bounds(&loads);

        for position in 0..=route.visits.len() {
            let before = if position == 0 { 0 } else { loads[position - 1] };
            let arrival = before + demand;
            if arrival < 0 || arrival > capacity {
                continue;
            }
            if position < route.visits.len()
                && (suffix_min[position] + demand < 0 || suffix_max[position] + demand > capacity)
            {
                continue;
            }

            let previous = if position == 0 { 0 } else { route.visits[position - 1] };
            let next = route.visits.get(position).copied().unwrap_or(0);
            let delta = problem.distances.get(previous, node) + problem.distances.get(node, next)
                - problem.distances.get(previous, next);

            if best.is_none_or(|(_, _, cost)| delta < cost) {
                best = Some((route_index, position, delta));
            }
        }
    }

    best
}

/// Load after each visit, starting from zero at the depot.
fn running_loads(problem: &RoutingProblem, visits: &[usize]) -> Vec<i64> {
    let mut load = 0;
    visits
        .iter()
        .map(|&node| {
            load += problem.demands[node];
            load
        })
        .collect()
}

/// Suffix minimum and maximum of a load profile.
fn suffix_bounds(loads: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let mut suffix_min = loads.to_vec();
    let mut suffix_max = loads.to_vec();
    for i in (0..loads.len().saturating_sub(1)).rev() {
        suffix_min[i] = suffix_min[i].min(suffix_min[i + 1]);
        suffix_max[i] = suffix_max[i].max(suffix_max[i + 1]);
    }
    (suffix_min, suffix_max)
}

/// Distance of a depot-to-depot route, or `None` if any load leaves
/// `[0, capacity]`.
fn evaluate_route(problem: &RoutingProblem, visits: &[usize], capacity: i64) -> Option<f64> {
    let mut load = 0i64;
    let mut distance = 0.0;
    let mut previous = 0usize;

    for &node in visits {
        load += problem.demands[node];
        if load < 0 || load > capacity {
            return None;
        }
        distance += problem.distances.get(previous, node);
        previous = node;
    }

    Some(distance + problem.distances.get(previous, 0))
}

/// 2-opt: reverse a segment within a route to shorten it.
/// Returns true if an improvement was made.
fn two_opt_improve(
    problem: &RoutingProblem,
    route: &mut RouteState,
    capacity: i64,
    deadline: &Deadline,
) -> bool {
    let n = route.visits.len();
    if n < 2 {
        return false;
    }

    for i in 0..n - 1 {
        for j in i + 1..n {
            if deadline.expired() {
                return false;
            }

            let mut candidate = route.visits.clone();
            candidate[i..=j].reverse();

            if let Some(distance) = evaluate_route(problem, &candidate, capacity) {
                if distance < route.distance - IMPROVEMENT_EPSILON {
                    route.visits = candidate;
                    route.distance = distance;
                    return true;
                }
            }
        }
    }

    false
}

/// Relocate: move a node to another position, in the same route or another.
/// Returns true if an improvement was made.
fn relocate_improve(
    problem: &RoutingProblem,
    routes: &mut [RouteState],
    capacity: i64,
    deadline: &Deadline,
) -> bool {
    for from in 0..routes.len() {
        for visit_index in 0..routes[from].visits.len() {
            let node = routes[from].visits[visit_index];

            let mut from_candidate = routes[from].visits.clone();
            from_candidate.remove(visit_index);
            let from_distance = evaluate_route(problem, &from_candidate, capacity);

            for to in 0..routes.len() {
                let base = if from == to { &from_candidate } else { &routes[to].visits };

                for position in 0..=base.len() {
                    if deadline.expired() {
                        return false;
                    }
                    if from == to && position == visit_index {
                        continue;
                    }

                    let mut to_candidate = base.clone();
                    to_candidate.insert(position, node);

                    if from == to {
                        let Some(distance) = evaluate_route(problem, &to_candidate, capacity) else {
                            continue;
                        };
                        if distance < routes[from].distance - IMPROVEMENT_EPSILON {
                            routes[from].visits = to_candidate;
                            routes[from].distance = distance;
                            return true;
                        }
                        continue;
                    }

                    let Some(from_distance) = from_distance else {
                        continue;
                    };
                    let Some(to_distance) = evaluate_route(problem, &to_candidate, capacity) else {
                        continue;
                    };

                    let before = routes[from].distance + routes[to].distance;
                    if from_distance + to_distance < before - IMPROVEMENT_EPSILON {
                        routes[from].visits = from_candidate;
                        routes[from].distance = from_distance;
                        routes[to].visits = to_candidate;
                        routes[to].distance = to_distance;
                        return true;
                    }
                }
            }
        }
    }

    false
}

/// Run local search until no more improvements, the iteration cap, or the
/// deadline.
fn local_search(
    problem: &RoutingProblem,
    routes: &mut [RouteState],
    capacity: i64,
    options: &SolveOptions,
    deadline: &Deadline,
) {
    for _ in 0..options.local_search_iterations {
        if deadline.expired() {
            break;
        }

        let mut improved = false;

        for route in routes.iter_mut() {
            if two_opt_improve(problem, route, capacity, deadline) {
                improved = true;
            }
        }

        if relocate_improve(problem, routes, capacity, deadline) {
            improved = true;
        }

        if !improved {
            break;
        }
    }
}

// ============================================================================
// Greedy nearest neighbour
// ============================================================================

/// Greedy builder: each vehicle repeatedly drives to the nearest node it
/// can serve without leaving `[0, capacity]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborSolver;

impl RoutingSolver for NearestNeighborSolver {
    fn name(&self) -> &str {
        "nearest_neighbor"
    }

    fn solve(&self, problem: &RoutingProblem, params: &SimulationParams) -> Option<RouteAssignment> {
        let deadline = Deadline::after_secs(params.runtime_seconds);
        let capacity = i64::from(params.vehicle_capacity);

        let mut unvisited: Vec<usize> = (1..problem.len()).collect();
        let mut sequences = Vec::new();

        for _ in 0..params.num_vehicles {
            if unvisited.is_empty() {
                break;
            }

            let mut sequence = Vec::new();
            let mut current = 0usize;
            let mut load = 0i64;

            loop {
                if deadline.expired() {
                    debug!("nearest neighbour construction ran out of time");
                    return None;
                }

                let next = unvisited
                    .iter()
                    .enumerate()
                    .filter(|&(_, &node)| (0..=capacity).contains(&(load + problem.demands[node])))
                    .min_by(|&(_, &a), &(_, &b)| {
                        problem
                            .distances
                            .get(current, a)
                            .total_cmp(&problem.distances.get(current, b))
                            .then(a.cmp(&b))
                    })
                    .map(|(position, &node)| (position, node));

                let Some((position, node)) = next else {
                    break;
                };

                unvisited.remove(position);
                load += problem.demands[node];
                sequence.push(node);
                current = node;
            }

            sequences.push(sequence);
        }

        if !unvisited.is_empty() {
            debug!(remaining = unvisited.len(), "nearest neighbour left nodes unserved");
            return None;
        }

        Some(RouteAssignment::from_sequences(problem, &sequences))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::{DemandColumn, NodeRef};
    use crate::matrix::DistanceMatrix;

    fn params(num_vehicles: u32, vehicle_capacity: u32) -> SimulationParams {
        SimulationParams {
            demand_column: DemandColumn::Signed,
            num_vehicles,
            vehicle_capacity,
            runtime_seconds: 5,
        }
    }

    /// Depot plus points on a line at x = 1..=n, distance |xi - xj|.
    fn line_problem(demands: Vec<i64>) -> RoutingProblem {
        let n = demands.len();
        let rows = (0..n)
            .map(|i| (0..n).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        RoutingProblem {
            nodes: (0..n)
                .map(|i| if i == 0 { NodeRef::depot() } else { NodeRef::pickup(i) })
                .collect(),
            demands,
            distances: DistanceMatrix::from_rows(rows).unwrap(),
        }
    }

    fn visited(assignment: &RouteAssignment) -> Vec<usize> {
        let mut nodes: Vec<usize> = assignment.routes.iter().flat_map(|r| r.visits()).collect();
        nodes.sort();
        nodes
    }

    #[test]
    fn test_insertion_visits_every_node_once() {
        let problem = line_problem(vec![0, 1, 2, 3, 1]);
        let assignment = InsertionSolver::default().solve(&problem, &params(2, 10)).unwrap();
        assert_eq!(visited(&assignment), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_insertion_single_vehicle_line_is_optimal() {
        let problem = line_problem(vec![0, 1, 1, 1, 1]);
        let assignment = InsertionSolver::default().solve(&problem, &params(1, 10)).unwrap();
        assert_eq!(assignment.routes.len(), 1);
        assert_eq!(assignment.total_distance(), 8.0);
    }

    #[test]
    fn test_insertion_respects_capacity() {
        let problem = line_problem(vec![0, 3, 3, 3, 3]);
        let assignment = InsertionSolver::default().solve(&problem, &params(2, 6)).unwrap();
        assert_eq!(assignment.routes.len(), 2);
        for route in &assignment.routes {
            assert!(route.within_capacity(6));
        }
    }

    #[test]
    fn test_insertion_infeasible_capacity() {
        let problem = line_problem(vec![0, 4, 4, 4]);
        assert!(InsertionSolver::default().solve(&problem, &params(1, 6)).is_none());
    }

    #[test]
    fn test_dropoff_waits_for_pickups() {
        // node 3 is a dropoff of 3; nodes 1 and 2 pick up 2 each
        let problem = line_problem(vec![-3, 2, 2, -3]);
        let solvers = [
            SolverAdapter::from_kind(SolverKind::Insertion),
            SolverAdapter::from_kind(SolverKind::NearestNeighbor),
        ];
        for solver in solvers {
            let assignment = solver.solve(&problem, &params(1, 10)).unwrap();
            let route = &assignment.routes[0];
            assert!(route.within_capacity(10), "{} broke the load bounds", solver.name());
            let order: Vec<usize> = route.visits().collect();
            let dropoff_at = order.iter().position(|&n| n == 3).unwrap();
            assert_eq!(dropoff_at, 2);
        }
    }

    #[test]
    fn test_zero_vehicles_is_infeasible() {
        let problem = line_problem(vec![0, 1]);
        assert!(InsertionSolver::default().solve(&problem, &params(0, 10)).is_none());
        assert!(NearestNeighborSolver.solve(&problem, &params(0, 10)).is_none());
    }

    #[test]
    fn test_depot_only_problem() {
        let problem = line_problem(vec![0]);
        let assignment = InsertionSolver::default().solve(&problem, &params(3, 10)).unwrap();
        assert!(assignment.routes.is_empty());
    }

    #[test]
    fn test_nearest_neighbor_runs_out_of_vehicles() {
        let problem = line_problem(vec![0, 5, 5, 5]);
        assert!(NearestNeighborSolver.solve(&problem, &params(2, 5)).is_none());
        let assignment = NearestNeighborSolver.solve(&problem, &params(3, 5)).unwrap();
        assert_eq!(assignment.routes.len(), 3);
    }

    #[test]
    fn test_insertion_is_repeatable() {
        let problem = line_problem(vec![0, 2, 1, 3, 2, 1, 2]);
        let solver = InsertionSolver::default();
        let first = solver.solve(&problem, &params(2, 6)).unwrap();
        let second = solver.solve(&problem, &params(2, 6)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_adapter_names() {
        assert_eq!(SolverAdapter::from_kind(SolverKind::Insertion).name(), "insertion");
        assert_eq!(SolverAdapter::from_kind(SolverKind::NearestNeighbor).name(), "nearest_neighbor");
    }
}
