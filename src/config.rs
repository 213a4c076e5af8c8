//! Experiment configuration.
//!
//! Configuration is read from JSON once and validated into an immutable
//! [`ExperimentConfig`] that is handed to the sweep runner.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::demand::DemandColumn;
use crate::error::{PlannerError, Result};
use crate::solver::{SolverAdapter, SolverKind};
use crate::summary::EstimateMultipliers;
use crate::sweep::{ParameterSweep, Range};

pub const PICKUPS_ONLY: &str = "Pickups Only";
pub const PICKUPS_AND_DROPOFFS: &str = "Pickups and Dropoffs";

/// A validated experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub name: String,
    pub solver: SolverKind,
    pub output_dir: PathBuf,
    /// Solve stage-two routes on the rayon pool.
    pub parallel: bool,
    /// Stop starting new runs once this many seconds have passed.
    pub max_sweep_seconds: Option<u64>,
    /// Units per pickup and per dropoff item for the summary's estimate
    /// columns.
    pub estimate_multipliers: Option<EstimateMultipliers>,
    pub pickups_only: ParameterSweep,
    pub pickups_and_dropoffs: ParameterSweep,
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        raw.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The solver adapter this experiment is configured for.
    pub fn solver(&self) -> SolverAdapter {
        SolverAdapter::from_kind(self.solver)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    name: String,
    #[serde(default)]
    solver: SolverKind,
    output_dir: PathBuf,
    #[serde(default = "default_parallel")]
    parallel: bool,
    #[serde(default)]
    max_sweep_seconds: Option<u64>,
    #[serde(default)]
    estimate_multipliers: Option<EstimateMultipliers>,
    pickups_only: SweepConfig,
    pickups_and_dropoffs: SweepConfig,
}

fn default_parallel() -> bool {
    true
}

impl RawConfig {
    fn validate(self) -> Result<ExperimentConfig> {
        if self.name.trim().is_empty() {
            return Err(PlannerError::Config("experiment name is empty".to_string()));
        }
        if let Some(multipliers) = self.estimate_multipliers {
            for (field, multiplier) in [("pickup", multipliers.pickup), ("dropoff", multipliers.dropoff)] {
                if !multiplier.is_finite() || multiplier < 0.0 {
                    return Err(PlannerError::Config(format!(
                        "estimate_multipliers.{field} must be a non-negative number, got {multiplier}"
                    )));
                }
            }
        }

        Ok(ExperimentConfig {
            name: self.name,
            solver: self.solver,
            output_dir: self.output_dir,
            parallel: self.parallel,
            max_sweep_seconds: self.max_sweep_seconds,
            estimate_multipliers: self.estimate_multipliers,
            pickups_only: self.pickups_only.into_sweep(PICKUPS_ONLY)?,
            pickups_and_dropoffs: self.pickups_and_dropoffs.into_sweep(PICKUPS_AND_DROPOFFS)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SweepConfig {
    demand_column: DemandColumn,
    num_vehicles: RangeSpec,
    vehicle_capacity: RangeSpec,
    simulation_runtime: RangeSpec,
}

impl SweepConfig {
    fn into_sweep(self, name: &str) -> Result<ParameterSweep> {
        Ok(ParameterSweep {
            name: name.to_string(),
            demand_column: self.demand_column,
            num_vehicles: self.num_vehicles.into_range("num_vehicles")?,
            vehicle_capacity: self.vehicle_capacity.into_range("vehicle_capacity")?,
            simulation_runtime: self.simulation_runtime.into_range("simulation_runtime")?,
        })
    }
}

/// Either a single value or an inclusive `{min, max, step}` range.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RangeSpec {
    Fixed(u32),
    Range { min: u32, max: u32, step: u32 },
}

impl RangeSpec {
    fn into_range(self, field: &str) -> Result<Range> {
        match self {
            RangeSpec::Fixed(value) => Ok(Range::fixed(value)),
            RangeSpec::Range { min, max, step } => Range::new(field, min, max, step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "name": "Combined Dropoffs and Pickups",
        "output_dir": "runs",
        "estimate_multipliers": {"pickup": 50, "dropoff": 250},
        "pickups_only": {
            "demand_column": "Daily_Pickup_Totes",
            "num_vehicles": 20,
            "vehicle_capacity": {"min": 10, "max": 30, "step": 10},
            "simulation_runtime": 5
        },
        "pickups_and_dropoffs": {
            "demand_column": "signed",
            "num_vehicles": {"min": 1, "max": 3, "step": 1},
            "vehicle_capacity": 24,
            "simulation_runtime": 2
        }
    }"#;

    #[test]
    fn test_parse_config_with_defaults() {
        let config = ExperimentConfig::from_json_str(CONFIG).unwrap();
        assert_eq!(config.solver, SolverKind::Insertion);
        assert!(config.parallel);
        assert_eq!(config.max_sweep_seconds, None);
        assert_eq!(
            config.estimate_multipliers,
            Some(EstimateMultipliers { pickup: 50.0, dropoff: 250.0 })
        );
        assert_eq!(config.pickups_only.name, PICKUPS_ONLY);
        assert_eq!(config.pickups_only.demand_column, DemandColumn::Pickup);
        assert_eq!(config.pickups_only.vehicle_capacity.values(), vec![10, 20, 30]);
        assert_eq!(config.pickups_and_dropoffs.demand_column, DemandColumn::Signed);
        assert_eq!(config.pickups_only.count() * config.pickups_and_dropoffs.count(), 9);
    }

    #[test]
    fn test_solver_selected_by_name() {
        let json = CONFIG.replacen("\"output_dir\"", "\"solver\": \"nearest_neighbor\", \"output_dir\"", 1);
        let config = ExperimentConfig::from_json_str(&json).unwrap();
        assert_eq!(config.solver, SolverKind::NearestNeighbor);
    }

    #[test]
    fn test_zero_step_is_invalid_range() {
        let json = CONFIG.replace(r#"{"min": 1, "max": 3, "step": 1}"#, r#"{"min": 1, "max": 3, "step": 0}"#);
        let err = ExperimentConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidRange { ref field, .. } if field == "num_vehicles"));
        assert!(err.is_input_validation());
    }

    #[test]
    fn test_negative_multiplier_rejected() {
        let json = CONFIG.replace(r#""dropoff": 250"#, r#""dropoff": -1.0"#);
        let err = ExperimentConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, PlannerError::Config(ref message) if message.contains("dropoff")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = CONFIG.replacen("\"output_dir\"", "\"vehicles\": 3, \"output_dir\"", 1);
        assert!(matches!(
            ExperimentConfig::from_json_str(&json),
            Err(PlannerError::Serialization(_))
        ));
    }
}
