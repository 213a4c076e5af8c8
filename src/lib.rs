//! tote-planner core
//!
//! Two-stage pickup and dropoff routing: solve pickup-only routes for every
//! location, then re-solve each route with dropoffs interleaved, and sweep
//! solver parameters for sensitivity analysis.

pub mod composer;
pub mod config;
pub mod demand;
pub mod error;
pub mod haversine;
pub mod location;
pub mod matrix;
pub mod osrm;
pub mod output;
pub mod segment;
pub mod solver;
pub mod summary;
pub mod sweep;
pub mod traits;

pub use error::{PlannerError, Result};
