//! Error types shared across the planner.

use std::io;

/// Errors raised by the planner.
///
/// Infeasibility is never an error: stage-one and stage-two failures are
/// captured in the composition report instead.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Malformed distance matrix: {0}")]
    MalformedMatrix(String),

    #[error("Distance matrix has dimension {matrix} but {locations} locations were loaded")]
    DimensionMismatch { matrix: usize, locations: usize },

    #[error("Location {index} has negative {field} demand ({value})")]
    InvalidDemand {
        index: usize,
        field: &'static str,
        value: i64,
    },

    #[error("Invalid range for {field}: {message}")]
    InvalidRange { field: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Distance provider error: {0}")]
    Provider(String),
}

impl PlannerError {
    /// True for errors that reject the input before any solving begins.
    pub fn is_input_validation(&self) -> bool {
        matches!(
            self,
            PlannerError::MalformedMatrix(_)
                | PlannerError::DimensionMismatch { .. }
                | PlannerError::InvalidDemand { .. }
                | PlannerError::InvalidRange { .. }
                | PlannerError::Config(_)
        )
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Provider(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlannerError>;
