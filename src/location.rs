//! Service locations and the location input table.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

/// Index of the depot in every location table.
pub const DEPOT: usize = 0;

/// A service location. Row 0 of the input table is the depot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub index: usize,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    /// Items collected here per visit.
    pub pickup_demand: u32,
    /// Clean items delivered here per visit.
    pub dropoff_demand: u32,
    pub location_type: String,
    pub pickup_type: String,
}

impl Location {
    pub fn coords(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn is_depot(&self) -> bool {
        self.index == DEPOT
    }
}

/// A raw row of the location input table, before demand validation.
///
/// Accepts both the snake_case headers and the spreadsheet column names
/// (`Daily_Pickup_Totes`, `Weekly_Dropoff_Totes`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Latitude")]
    pub latitude: f64,
    #[serde(alias = "Longitude")]
    pub longitude: f64,
    #[serde(default, alias = "Address")]
    pub address: String,
    #[serde(alias = "Daily_Pickup_Totes")]
    pub pickup_demand: i64,
    #[serde(alias = "Weekly_Dropoff_Totes")]
    pub dropoff_demand: i64,
    #[serde(default, alias = "Location_Type")]
    pub location_type: String,
    #[serde(default, alias = "Pickup_Type")]
    pub pickup_type: String,
}

impl LocationRecord {
    /// Validate demands and assign the row index.
    pub fn into_location(self, index: usize) -> Result<Location> {
        let pickup_demand = non_negative(index, "pickup", self.pickup_demand)?;
        let dropoff_demand = non_negative(index, "dropoff", self.dropoff_demand)?;

        Ok(Location {
            index,
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            pickup_demand,
            dropoff_demand,
            location_type: self.location_type,
            pickup_type: self.pickup_type,
        })
    }
}

fn non_negative(index: usize, field: &'static str, value: i64) -> Result<u32> {
    if value < 0 {
        return Err(PlannerError::InvalidDemand { index, field, value });
    }
    u32::try_from(value).map_err(|_| PlannerError::InvalidDemand { index, field, value })
}

/// Read the location table from any CSV source.
pub fn read_locations<R: Read>(reader: R) -> Result<Vec<Location>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut locations = Vec::new();

    for (index, record) in reader.deserialize::<LocationRecord>().enumerate() {
        locations.push(record?.into_location(index)?);
    }

    if locations.is_empty() {
        return Err(PlannerError::Config(
            "location table is empty; row 0 must be the depot".to_string(),
        ));
    }

    Ok(locations)
}

/// Read the location table from a CSV file.
pub fn load_locations(path: impl AsRef<Path>) -> Result<Vec<Location>> {
    read_locations(File::open(path)?)
}
