//! Distance matrix loading, validation and submatrix extraction.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::demand::NodeRef;
use crate::error::{PlannerError, Result};
use crate::location::Location;
use crate::traits::DistanceMatrixProvider;

/// A validated square distance matrix.
///
/// Row and column order match location index order. Entries are
/// non-negative and finite, the diagonal is zero, and the matrix need not
/// be symmetric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Validate and wrap raw rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(PlannerError::MalformedMatrix(format!(
                    "row {i} has {} columns, expected {n}",
                    row.len()
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(PlannerError::MalformedMatrix(format!(
                        "entry ({i}, {j}) is {value}; distances must be finite and non-negative"
                    )));
                }
            }
            if row[i] != 0.0 {
                return Err(PlannerError::MalformedMatrix(format!(
                    "diagonal entry ({i}, {i}) is {}, expected 0",
                    row[i]
                )));
            }
        }

        Ok(Self { rows })
    }

    /// Read a matrix from CSV with column headers `"0".."N-1"`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = reader.headers()?.clone();
        for (position, header) in headers.iter().enumerate() {
            if header.trim() != position.to_string() {
                return Err(PlannerError::MalformedMatrix(format!(
                    "column {position} is labelled {header:?}, expected \"{position}\""
                )));
            }
        }

        let mut rows = Vec::with_capacity(headers.len());
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .enumerate()
                .map(|(j, field)| {
                    field.trim().parse::<f64>().map_err(|_| {
                        PlannerError::MalformedMatrix(format!(
                            "entry ({i}, {j}) is not numeric: {field:?}"
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }

        Self::from_rows(rows)
    }

    /// Load a matrix from a CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_csv_reader(File::open(path)?)
    }

    /// Build a matrix for `locations` from a distance provider.
    pub fn from_provider<P>(provider: &P, locations: &[Location]) -> Result<Self>
    where
        P: DistanceMatrixProvider + ?Sized,
    {
        let coords: Vec<(f64, f64)> = locations.iter().map(Location::coords).collect();
        Self::from_rows(provider.matrix_for(&coords)?)
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Distance from `from` to `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is `>= self.size()`. Use
    /// [`extract_submatrix`](Self::extract_submatrix) for checked access.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Fails unless the matrix has one row per location.
    pub fn ensure_dimension(&self, location_count: usize) -> Result<()> {
        if self.size() != location_count {
            return Err(PlannerError::DimensionMismatch {
                matrix: self.size(),
                locations: location_count,
            });
        }
        Ok(())
    }

    /// Extract the `k×k` matrix over `indices`, reindexed to `0..k`.
    ///
    /// Indices may repeat; a repeated index yields a copy of the source row
    /// and column.
    pub fn extract_submatrix(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&index| index >= self.size()) {
            return Err(PlannerError::MalformedMatrix(format!(
                "index {bad} out of range for a {n}x{n} matrix",
                n = self.size()
            )));
        }

        let rows = indices
            .iter()
            .map(|&from| indices.iter().map(|&to| self.rows[from][to]).collect())
            .collect();

        Ok(Self { rows })
    }

    /// Submatrix over the physical locations behind `nodes`.
    pub fn submatrix_for(&self, nodes: &[NodeRef]) -> Result<Self> {
        let indices: Vec<usize> = nodes.iter().map(|node| node.location).collect();
        self.extract_submatrix(&indices)
    }
}
