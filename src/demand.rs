//! Signed demand model.
//!
//! Pickups are positive, dropoffs are negative. Locations always store
//! non-negative demands; the sign only exists at the [`NodeRef`] layer.

use serde::{Deserialize, Serialize};

use crate::location::{Location, DEPOT};

/// The part a physical location plays in a routing problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Depot,
    Pickup,
    Dropoff,
}

/// A (physical location, role) pair.
///
/// Lets one location appear twice in a combined problem without copying
/// rows of the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub location: usize,
    pub role: Role,
}

impl NodeRef {
    pub fn depot() -> Self {
        Self { location: DEPOT, role: Role::Depot }
    }

    pub fn pickup(location: usize) -> Self {
        Self { location, role: Role::Pickup }
    }

    pub fn dropoff(location: usize) -> Self {
        Self { location, role: Role::Dropoff }
    }

    pub fn is_depot(&self) -> bool {
        self.role == Role::Depot
    }
}

/// Which demand figure a solver call should route against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandColumn {
    #[serde(alias = "Daily_Pickup_Totes")]
    Pickup,
    #[serde(alias = "Weekly_Dropoff_Totes")]
    Dropoff,
    #[serde(alias = "Capacity")]
    Signed,
}

/// Read-only view over location demands.
///
/// Node and stop indices are location indices into the wrapped slice. The
/// lookups below index directly, so callers validate indices first (the
/// composer checks the matrix against the location count).
#[derive(Debug, Clone, Copy)]
pub struct DemandModel<'a> {
    locations: &'a [Location],
}

impl<'a> DemandModel<'a> {
    pub fn new(locations: &'a [Location]) -> Self {
        Self { locations }
    }

    /// Signed capacity of a single node.
    ///
    /// A depot node outside a sub-problem has no demand of its own.
    ///
    /// # Panics
    ///
    /// Panics if `node.location` is not a valid location index.
    pub fn signed_capacity(&self, node: NodeRef) -> i64 {
        let location = &self.locations[node.location];
        match node.role {
            Role::Pickup => i64::from(location.pickup_demand),
            Role::Dropoff => -i64::from(location.dropoff_demand),
            Role::Depot => 0,
        }
    }

    /// Depot capacity for a route: the negated sum of dropoff demand over
    /// its unique physical stops.
    ///
    /// # Panics
    ///
    /// Panics if a stop is not a valid location index.
    pub fn depot_capacity(&self, stops: &[usize]) -> i64 {
        let mut seen = Vec::with_capacity(stops.len());
        let mut total = 0i64;
        for &stop in stops {
            if stop == DEPOT || seen.contains(&stop) {
                continue;
            }
            seen.push(stop);
            total += i64::from(self.locations[stop].dropoff_demand);
        }
        -total
    }

    /// Signed capacities for every node of a sub-problem.
    ///
    /// Depot nodes take the preload balance of the other nodes' locations.
    pub fn signed_capacities(&self, nodes: &[NodeRef]) -> Vec<i64> {
        let stops: Vec<usize> = nodes
            .iter()
            .filter(|node| !node.is_depot())
            .map(|node| node.location)
            .collect();
        let depot = self.depot_capacity(&stops);

        nodes
            .iter()
            .map(|node| if node.is_depot() { depot } else { self.signed_capacity(*node) })
            .collect()
    }

    /// Demand vector for a solver call over `nodes`.
    ///
    /// # Panics
    ///
    /// Panics if a node refers to a location outside the model.
    pub fn demands_for(&self, nodes: &[NodeRef], column: DemandColumn) -> Vec<i64> {
        match column {
            DemandColumn::Pickup => nodes
                .iter()
                .map(|node| i64::from(self.locations[node.location].pickup_demand))
                .collect(),
            DemandColumn::Dropoff => nodes
                .iter()
                .map(|node| i64::from(self.locations[node.location].dropoff_demand))
                .collect(),
            DemandColumn::Signed => self.signed_capacities(nodes),
        }
    }
}
