//! Route statistics for sensitivity analysis.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::composer::CombinedRoute;
use crate::demand::Role;
use crate::location::Location;

/// Route identifier used for the totals row.
pub const TOTAL_ROW: &str = "total";

/// Units carried per demand item, for each item type.
///
/// Pickup and dropoff items differ in size, so a tote of dirty items and a
/// tote of clean items hold different unit counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimateMultipliers {
    pub pickup: f64,
    pub dropoff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub route_id: String,
    pub pickup_demand: u64,
    pub dropoff_demand: u64,
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_pickup_units: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_dropoff_units: Option<f64>,
}

impl SummaryRow {
    fn empty(route_id: &str) -> Self {
        Self {
            route_id: route_id.to_string(),
            pickup_demand: 0,
            dropoff_demand: 0,
            distance: 0.0,
            estimated_pickup_units: None,
            estimated_dropoff_units: None,
        }
    }

    fn apply_estimate(&mut self, pickup_multiplier: f64, dropoff_multiplier: f64) {
        self.estimated_pickup_units = Some(pickup_multiplier * self.pickup_demand as f64);
        self.estimated_dropoff_units = Some(dropoff_multiplier * self.dropoff_demand as f64);
    }
}

/// Per-route demand and distance, plus a totals row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
    pub totals: SummaryRow,
}

impl SummaryTable {
    /// Add linear unit estimates to every row: pickup demand scaled by
    /// `pickup_multiplier`, dropoff demand by `dropoff_multiplier`.
    pub fn with_estimate(mut self, pickup_multiplier: f64, dropoff_multiplier: f64) -> Self {
        for row in &mut self.rows {
            row.apply_estimate(pickup_multiplier, dropoff_multiplier);
        }
        self.totals.apply_estimate(pickup_multiplier, dropoff_multiplier);
        self
    }

    pub fn with_multipliers(self, multipliers: EstimateMultipliers) -> Self {
        self.with_estimate(multipliers.pickup, multipliers.dropoff)
    }
}

/// Summarize routes grouped by identifier, in first-seen order.
///
/// Pickup demand is counted on pickup stops and dropoff demand on dropoff
/// stops, so a location served in both roles is not counted twice. Route
/// length is the last stop's cumulative distance.
pub fn summarize<'r>(
    routes: impl IntoIterator<Item = &'r CombinedRoute>,
    locations: &[Location],
) -> SummaryTable {
    let mut rows: Vec<SummaryRow> = Vec::new();
    let mut positions: HashMap<&'r str, usize> = HashMap::new();

    for route in routes {
        let position = *positions.entry(route.id.as_str()).or_insert_with(|| {
            rows.push(SummaryRow::empty(&route.id));
            rows.len() - 1
        });
        let row = &mut rows[position];

        for stop in &route.stops {
            let location = &locations[stop.node.location];
            match stop.node.role {
                Role::Pickup => row.pickup_demand += u64::from(location.pickup_demand),
                Role::Dropoff => row.dropoff_demand += u64::from(location.dropoff_demand),
                Role::Depot => {}
            }
        }
        row.distance = route.distance();
    }

    let mut totals = SummaryRow::empty(TOTAL_ROW);
    for row in &rows {
        totals.pickup_demand += row.pickup_demand;
        totals.dropoff_demand += row.dropoff_demand;
        totals.distance += row.distance;
    }

    SummaryTable { rows, totals }
}
