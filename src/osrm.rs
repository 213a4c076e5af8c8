//! OSRM HTTP adapter for distance matrices.

use serde::Deserialize;
use tracing::debug;

use crate::error::{PlannerError, Result};
use crate::traits::DistanceMatrixProvider;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Table service URL; OSRM takes coordinates as `lng,lat`.
    fn table_url(&self, locations: &[(f64, f64)]) -> String {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<Vec<Vec<f64>>> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.table_url(locations);
        debug!(locations = locations.len(), "requesting OSRM distance table");

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        parse_table(body, locations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

/// Convert a table response into whole-metre distances.
///
/// Unroutable pairs come back as `null` and are rejected.
fn parse_table(body: OsrmTableResponse, expected: usize) -> Result<Vec<Vec<f64>>> {
    if body.code != "Ok" {
        return Err(PlannerError::Provider(format!("OSRM returned code {}", body.code)));
    }
    let rows = body
        .distances
        .ok_or_else(|| PlannerError::Provider("OSRM response has no distances".to_string()))?;
    if rows.len() != expected {
        return Err(PlannerError::Provider(format!(
            "OSRM returned {} rows for {} locations",
            rows.len(),
            expected
        )));
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, value)| {
                    value.map(f64::round).ok_or_else(|| {
                        PlannerError::Provider(format!("no route between locations {i} and {j}"))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}
