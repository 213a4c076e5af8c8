//! Two-stage pickup and dropoff composition.
//!
//! Stage one routes every location for pickups only. Stage two re-solves
//! each stage-one route on its own, adding a dropoff node for every stop
//! that receives clean items, so dropoffs are interleaved with the pickups
//! that make room for them.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::demand::{DemandColumn, DemandModel, NodeRef};
use crate::error::{PlannerError, Result};
use crate::location::Location;
use crate::matrix::DistanceMatrix;
use crate::segment::{segment_route, Segment};
use crate::sweep::SimulationParams;
use crate::traits::{RouteAssignment, RoutingProblem, RoutingSolver, VehicleRoute};

/// Progress of one composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionState {
    Pending,
    StageOneSolving,
    StageOneInfeasible,
    StageOneSolved,
    StageTwoSolving,
    Done,
}

/// A stop on a combined route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedStop {
    pub node: NodeRef,
    pub cumulative_distance: f64,
    pub cumulative_load: i64,
}

/// A stage-two route, identified as `"{stage_one_route}-{stage_two_route}"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRoute {
    pub id: String,
    pub stage_one_route: usize,
    pub stage_two_route: usize,
    pub stops: Vec<CombinedStop>,
}

impl CombinedRoute {
    pub fn distance(&self) -> f64 {
        self.stops.last().map(|stop| stop.cumulative_distance).unwrap_or(0.0)
    }
}

/// Why a stage-one route produced no combined routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTwoInfeasible {
    pub stage_one_route: usize,
    /// Physical stops of the route, depot first.
    pub stops: Vec<usize>,
    pub depot_capacity: i64,
}

/// Stage-two result for one stage-one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOutcome {
    pub stage_one_route: usize,
    pub result: std::result::Result<Vec<CombinedRoute>, StageTwoInfeasible>,
}

/// Result of one composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionReport {
    pub state: CompositionState,
    /// Pickup-only routes; stage-one node `i` is location `i`.
    pub stage_one: Option<RouteAssignment>,
    pub outcomes: Vec<RouteOutcome>,
}

impl CompositionReport {
    fn stage_one_infeasible() -> Self {
        Self {
            state: CompositionState::StageOneInfeasible,
            stage_one: None,
            outcomes: Vec::new(),
        }
    }

    pub fn is_stage_one_infeasible(&self) -> bool {
        self.state == CompositionState::StageOneInfeasible
    }

    /// Every combined route, in stage-one order.
    pub fn combined_routes(&self) -> impl Iterator<Item = &CombinedRoute> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .flatten()
    }

    pub fn skipped_route_ids(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.stage_one_route)
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.combined_routes().count()
    }
}

/// Build the nodes of a combined sub-problem for `stops` (depot first):
/// the depot, every stop as a pickup, then a dropoff for every stop that
/// receives items.
pub fn combined_nodes(stops: &[usize], locations: &[Location]) -> Vec<NodeRef> {
    let customers = stops.get(1..).unwrap_or(&[]);

    std::iter::once(NodeRef::depot())
        .chain(customers.iter().map(|&stop| NodeRef::pickup(stop)))
        .chain(
            customers
                .iter()
                .filter(|&&stop| locations[stop].dropoff_demand > 0)
                .map(|&stop| NodeRef::dropoff(stop)),
        )
        .collect()
}

/// Build the stage-two problem for a segmented route.
///
/// The depot's demand is the negated dropoff total of the route. Distances
/// come from the segment's own submatrix; a location's pickup and dropoff
/// nodes share its row.
pub fn combined_problem(segment: &Segment, locations: &[Location]) -> Result<RoutingProblem> {
    let nodes = combined_nodes(&segment.stops, locations);
    let demands = DemandModel::new(locations).demands_for(&nodes, DemandColumn::Signed);
    let positions = nodes
        .iter()
        .map(|node| {
            segment.position(node.location).ok_or_else(|| {
                PlannerError::MalformedMatrix(format!("location {} is not on the segment", node.location))
            })
        })
        .collect::<Result<Vec<usize>>>()?;
    let distances = segment.distances.extract_submatrix(&positions)?;
    Ok(RoutingProblem { nodes, demands, distances })
}

/// Orchestrates the two-stage solve.
pub struct RouteComposer<'s, S: RoutingSolver + ?Sized> {
    solver: &'s S,
    parallel: bool,
}

impl<'s, S: RoutingSolver + ?Sized> RouteComposer<'s, S> {
    pub fn new(solver: &'s S) -> Self {
        Self { solver, parallel: true }
    }

    /// Run stage-two solves on the rayon pool (default) or one by one.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn compose(
        &self,
        locations: &[Location],
        matrix: &DistanceMatrix,
        pickup_params: &SimulationParams,
        combo_params: &SimulationParams,
    ) -> Result<CompositionReport> {
        let mut state = CompositionState::Pending;
        matrix.ensure_dimension(locations.len())?;

        advance(&mut state, CompositionState::StageOneSolving);
        let nodes: Vec<NodeRef> = std::iter::once(NodeRef::depot())
            .chain((1..locations.len()).map(NodeRef::pickup))
            .collect();
        let demands = DemandModel::new(locations).demands_for(&nodes, pickup_params.demand_column);
        let stage_one_problem = RoutingProblem {
            nodes,
            demands,
            distances: matrix.clone(),
        };

        info!(
            solver = self.solver.name(),
            locations = locations.len(),
            vehicles = pickup_params.num_vehicles,
            capacity = pickup_params.vehicle_capacity,
            "solving pickup-only routes"
        );
        let Some(stage_one) = self.solver.solve(&stage_one_problem, pickup_params) else {
            advance(&mut state, CompositionState::StageOneInfeasible);
            warn!(?pickup_params, "no feasible pickup-only routes");
            return Ok(CompositionReport::stage_one_infeasible());
        };
        advance(&mut state, CompositionState::StageOneSolved);
        info!(routes = stage_one.routes.len(), "pickup-only routes found");

        advance(&mut state, CompositionState::StageTwoSolving);
        let solve = |(route_id, route): (usize, &VehicleRoute)| -> Result<RouteOutcome> {
            let segment = segment_route(route, &stage_one_problem.nodes, matrix)?;
            self.solve_stage_two(route_id, &segment, locations, combo_params)
        };
        let outcomes = if self.parallel {
            stage_one
                .routes
                .par_iter()
                .enumerate()
                .map(solve)
                .collect::<Result<Vec<_>>>()?
        } else {
            stage_one
                .routes
                .iter()
                .enumerate()
                .map(solve)
                .collect::<Result<Vec<_>>>()?
        };
        advance(&mut state, CompositionState::Done);

        let report = CompositionReport {
            state,
            stage_one: Some(stage_one),
            outcomes,
        };
        info!(
            routes = report.route_count(),
            skipped = report.skipped_route_ids().len(),
            "composition complete"
        );
        Ok(report)
    }

    fn solve_stage_two(
        &self,
        route_id: usize,
        segment: &Segment,
        locations: &[Location],
        combo_params: &SimulationParams,
    ) -> Result<RouteOutcome> {
        let problem = combined_problem(segment, locations)?;
        let infeasible = || StageTwoInfeasible {
            stage_one_route: route_id,
            stops: segment.stops.clone(),
            depot_capacity: problem.depot_demand(),
        };

        debug!(
            route = route_id,
            nodes = problem.len(),
            depot_capacity = problem.depot_demand(),
            "solving combined pickup and dropoff route"
        );

        let Some(assignment) = self.solver.solve(&problem, combo_params) else {
            warn!(route = route_id, ?combo_params, "no feasible combined route; skipping");
            return Ok(RouteOutcome {
                stage_one_route: route_id,
                result: Err(infeasible()),
            });
        };

        let capacity = i64::from(combo_params.vehicle_capacity);
        if let Some(bad) = assignment.routes.iter().find(|route| !route.within_capacity(capacity)) {
            warn!(
                route = route_id,
                vehicle = bad.vehicle,
                "solver returned a route outside the load bounds; skipping"
            );
            return Ok(RouteOutcome {
                stage_one_route: route_id,
                result: Err(infeasible()),
            });
        }

        let routes = assignment
            .routes
            .iter()
            .enumerate()
            .map(|(sub_id, route)| CombinedRoute {
                id: format!("{route_id}-{sub_id}"),
                stage_one_route: route_id,
                stage_two_route: sub_id,
                stops: route
                    .stops
                    .iter()
                    .map(|stop| CombinedStop {
                        node: problem.nodes[stop.node],
                        cumulative_distance: stop.cumulative_distance,
                        cumulative_load: stop.cumulative_load,
                    })
                    .collect(),
            })
            .collect();

        Ok(RouteOutcome {
            stage_one_route: route_id,
            result: Ok(routes),
        })
    }
}

fn advance(state: &mut CompositionState, next: CompositionState) {
    debug!(from = ?state, to = ?next, "composition state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(index: usize, pickup: u32, dropoff: u32) -> Location {
        Location {
            index,
            name: format!("loc-{index}"),
            latitude: 0.0,
            longitude: 0.0,
            address: String::new(),
            pickup_demand: pickup,
            dropoff_demand: dropoff,
            location_type: String::new(),
            pickup_type: String::new(),
        }
    }

    #[test]
    fn test_combined_nodes_duplicate_dropoff_stops() {
        let locations = vec![location(0, 0, 0), location(1, 1, 0), location(2, 1, 2), location(3, 0, 5)];
        let nodes = combined_nodes(&[0, 3, 1, 2], &locations);
        assert_eq!(
            nodes,
            vec![
                NodeRef::depot(),
                NodeRef::pickup(3),
                NodeRef::pickup(1),
                NodeRef::pickup(2),
                NodeRef::dropoff(3),
                NodeRef::dropoff(2),
            ]
        );
    }

    #[test]
    fn test_combined_problem_depot_capacity() {
        let locations = vec![location(0, 0, 0), location(1, 1, 0), location(2, 1, 2), location(3, 0, 5)];
        let rows = (0..4)
            .map(|i| (0..4).map(|j| if i == j { 0.0 } else { (i + j) as f64 }).collect())
            .collect();
        let matrix = DistanceMatrix::from_rows(rows).unwrap();
        let segment = Segment {
            stops: vec![0, 2, 3],
            distances: matrix.extract_submatrix(&[0, 2, 3]).unwrap(),
        };

        let problem = combined_problem(&segment, &locations).unwrap();

        assert_eq!(problem.depot_demand(), -7);
        assert_eq!(problem.demands, vec![-7, 1, 0, -2, -5]);
        // pickup and dropoff nodes of location 2 share every distance
        for k in 0..problem.len() {
            assert_eq!(problem.distances.get(1, k), problem.distances.get(3, k));
            assert_eq!(problem.distances.get(k, 1), problem.distances.get(k, 3));
        }
        assert_eq!(problem.distances.get(1, 2), matrix.get(2, 3));
        assert_eq!(problem.distances.get(4, 0), matrix.get(3, 0));
    }

    #[test]
    fn test_combined_problem_uses_segment_distances() {
        let locations = vec![location(0, 0, 0), location(1, 1, 1), location(2, 2, 0)];
        let segment = Segment {
            stops: vec![0, 2, 1],
            distances: DistanceMatrix::from_rows(vec![
                vec![0.0, 7.0, 9.0],
                vec![7.0, 0.0, 4.0],
                vec![9.0, 4.0, 0.0],
            ])
            .unwrap(),
        };

        let problem = combined_problem(&segment, &locations).unwrap();

        assert_eq!(problem.nodes, vec![NodeRef::depot(), NodeRef::pickup(2), NodeRef::pickup(1), NodeRef::dropoff(1)]);
        assert_eq!(problem.distances.get(0, 1), 7.0);
        assert_eq!(problem.distances.get(1, 3), 4.0);
        assert_eq!(problem.distances.get(3, 0), 9.0);
    }
}
