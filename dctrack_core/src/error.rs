//! Error types for drift-chamber tracking.
//!
//! None of these cross the event boundary: the engine turns link and fit
//! failures into per-event status values and per-track sentinels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building the plane geometry table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// No planes were supplied
    #[error("Plane table is empty")]
    EmptyTable,

    /// A plane claims a chamber outside 1..=num_chambers
    #[error("Plane {plane} assigned to chamber {chamber}, expected 1..={num_chambers}")]
    InvalidChamber {
        plane: usize,
        chamber: usize,
        num_chambers: usize,
    },

    /// Coordinate uncertainty must be finite and positive
    #[error("Plane {plane} has invalid sigma {sigma}")]
    InvalidSigma { plane: usize, sigma: f64 },

    /// Projection coefficients must all be finite
    #[error("Plane {plane} has non-finite projection coefficients")]
    NonFiniteCoefficients { plane: usize },

    /// Ray-parameter map points outside the 9-element coefficient vector
    #[error("Ray coefficient index {0} out of range (0..9)")]
    CoefficientIndex(usize),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Link tolerances must be finite and positive
    #[error("Invalid link criterion {name}: {value}")]
    InvalidCriterion { name: &'static str, value: f64 },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl ConfigError {
    /// Creates an invalid-criterion error.
    pub fn criterion(name: &'static str, value: f64) -> Self {
        Self::InvalidCriterion { name, value }
    }
}

/// Stub-linking failures. Fatal for the current event only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Building another candidate would exceed the configured bound
    #[error("Too many tracks found (max {max})")]
    TooManyTracks { max: usize },
}

/// Reasons the normal-equations solve can refuse a hit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FitError {
    /// Fewer hits than ray parameters
    #[error("Under-constrained fit: {hits} hits for 4 parameters")]
    Underconstrained { hits: usize },

    /// The 4x4 matrix has no inverse (or the inverse is not finite)
    #[error("Normal-equations matrix is singular")]
    Singular,

    /// A hit references a plane missing from the geometry table
    #[error("Hit references unknown plane {0}")]
    UnknownPlane(usize),
}
