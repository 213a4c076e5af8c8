//! Reduce a stage-one route to the inputs of its stage-two sub-problem.

use crate::demand::NodeRef;
use crate::error::{PlannerError, Result};
use crate::location::DEPOT;
use crate::matrix::DistanceMatrix;
use crate::traits::VehicleRoute;

/// The physical stops of one route, depot first, with their distances.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Physical location indices in visiting order, starting at the depot.
    pub stops: Vec<usize>,
    /// Distances between `stops`, indexed by position in `stops`.
    pub distances: DistanceMatrix,
}

impl Segment {
    /// Stops after the depot.
    pub fn customers(&self) -> &[usize] {
        self.stops.get(1..).unwrap_or(&[])
    }

    /// Position of physical location `location` within the segment.
    pub fn position(&self, location: usize) -> Option<usize> {
        self.stops.iter().position(|&stop| stop == location)
    }
}

/// Segment `route`, whose stops index into `nodes`.
///
/// The closing return to the depot is dropped and every physical location
/// is kept once, in the order it was first visited.
pub fn segment_route(route: &VehicleRoute, nodes: &[NodeRef], matrix: &DistanceMatrix) -> Result<Segment> {
    let mut stops = vec![DEPOT];

    for stop in &route.stops {
        let node = nodes.get(stop.node).ok_or_else(|| {
            PlannerError::MalformedMatrix(format!(
                "route visits node {} but the problem has {} nodes",
                stop.node,
                nodes.len()
            ))
        })?;
        if !stops.contains(&node.location) {
            stops.push(node.location);
        }
    }

    let distances = matrix.extract_submatrix(&stops)?;
    Ok(Segment { stops, distances })
}
