//! Tracking and detector configuration.
//!
//! Everything here is plain serde data. Loading validates the values and
//! builds the immutable [`PlaneGeometryTable`].

use crate::error::{ConfigError, GeometryError};
use crate::geometry::{
    validate_ray_coeff_map, PlaneGeometry, PlaneGeometryTable, DEFAULT_RAY_COEFF_MAP,
    NUM_RAY_PARAMS,
};
use crate::projection::NUM_PLANE_COEFFS;
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Candidate-track bound used when the configured value is 0.
pub const DEFAULT_MAX_TRACKS: usize = 10;

// ============================================================================
// TRACKING CONFIGURATION
// ============================================================================

/// Absolute tolerances on the four stub deltas between two chambers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkCriteria {
    /// Position x tolerance (cm)
    pub xt: f64,

    /// Position y tolerance (cm)
    pub yt: f64,

    /// Slope x tolerance
    pub xpt: f64,

    /// Slope y tolerance
    pub ypt: f64,
}

impl Default for LinkCriteria {
    fn default() -> Self {
        Self {
            xt: 1.0,
            yt: 1.0,
            xpt: 0.05,
            ypt: 0.05,
        }
    }
}

impl LinkCriteria {
    /// True iff every component of `delta` is strictly inside its tolerance.
    #[inline]
    pub fn accepts(&self, delta: &Vector4<f64>) -> bool {
        delta[0].abs() < self.xt
            && delta[1].abs() < self.yt
            && delta[2].abs() < self.xpt
            && delta[3].abs() < self.ypt
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("xt", self.xt),
            ("yt", self.yt),
            ("xpt", self.xpt),
            ("ypt", self.ypt),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::criterion(name, value));
            }
        }
        Ok(())
    }
}

/// Configuration for the stub linker and track fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Stub-matching tolerances
    pub criteria: LinkCriteria,

    /// Maximum simultaneous candidate tracks per event (0 = default of 10)
    pub max_tracks: usize,

    /// Emit one track per space point instead of linking chambers
    pub single_stub: bool,

    /// Positions of `[x, y, xp, yp]` in each plane's coefficient vector
    pub ray_coeff_map: [usize; NUM_RAY_PARAMS],
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            criteria: LinkCriteria::default(),
            max_tracks: DEFAULT_MAX_TRACKS,
            single_stub: false,
            ray_coeff_map: DEFAULT_RAY_COEFF_MAP,
        }
    }
}

impl TrackingConfig {
    /// Track bound after normalising 0 to [`DEFAULT_MAX_TRACKS`].
    pub fn effective_max_tracks(&self) -> usize {
        if self.max_tracks == 0 {
            DEFAULT_MAX_TRACKS
        } else {
            self.max_tracks
        }
    }

    /// Check tolerances and the ray-coefficient map.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.criteria.validate()?;
        validate_ray_coeff_map(&self.ray_coeff_map)?;
        Ok(())
    }
}

// ============================================================================
// DETECTOR CONFIGURATION
// ============================================================================

/// How a plane's projection coefficients are given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaneGeometryConfig {
    /// Precomputed coefficients
    Coefficients {
        coefficients: [f64; NUM_PLANE_COEFFS],
    },

    /// Ideal plane at `z` (cm) measuring at `alpha` degrees from the x axis
    Ideal { z: f64, alpha: f64 },
}

/// One wire plane in the detector description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneConfig {
    pub name: String,
    pub chamber: usize,
    pub sigma: f64,
    #[serde(flatten)]
    pub geometry: PlaneGeometryConfig,
}

impl PlaneConfig {
    fn to_geometry(&self) -> PlaneGeometry {
        match &self.geometry {
            PlaneGeometryConfig::Coefficients { coefficients } => {
                PlaneGeometry::from_coefficients(self.chamber, self.sigma, *coefficients)
            }
            PlaneGeometryConfig::Ideal { z, alpha } => {
                PlaneGeometry::ideal(self.chamber, self.sigma, *z, alpha.to_radians())
            }
        }
    }
}

/// Detector description: chambers and their planes, in plane-number order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub num_chambers: usize,
    pub planes: Vec<PlaneConfig>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::hms_like()
    }
}

impl DetectorConfig {
    /// Two chambers at z = ∓40 cm, six planes each (x, y, u, v, y', x'),
    /// 1.8 cm apart, 200 µm resolution.
    pub fn hms_like() -> Self {
        const LAYOUT: [(&str, f64); 6] = [
            ("x1", 0.0),
            ("y1", 90.0),
            ("u1", 15.0),
            ("v1", -15.0),
            ("y2", 90.0),
            ("x2", 0.0),
        ];
        const SPACING: f64 = 1.8;

        let mut planes = Vec::with_capacity(12);
        for (chamber, center) in [(1usize, -40.0), (2usize, 40.0)] {
            for (k, (name, alpha)) in LAYOUT.iter().enumerate() {
                planes.push(PlaneConfig {
                    name: format!("{}{}", chamber, name),
                    chamber,
                    sigma: 0.02,
                    geometry: PlaneGeometryConfig::Ideal {
                        z: center + (k as f64 - 2.5) * SPACING,
                        alpha: *alpha,
                    },
                });
            }
        }

        Self {
            num_chambers: 2,
            planes,
        }
    }

    /// Build the validated geometry table.
    pub fn build_geometry(&self) -> Result<PlaneGeometryTable, GeometryError> {
        let planes = self.planes.iter().map(PlaneConfig::to_geometry).collect();
        PlaneGeometryTable::new(planes, self.num_chambers)
    }

    /// Plane number for a plane name.
    pub fn plane_number(&self, name: &str) -> Option<usize> {
        self.planes.iter().position(|p| p.name == name).map(|idx| idx + 1)
    }
}

// ============================================================================
// SETUP (Detector + Tracking)
// ============================================================================

/// Complete run setup as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl SetupConfig {
    /// Parse and validate a JSON setup.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let setup: SetupConfig = serde_json::from_str(json)?;
        setup.validate()?;
        Ok(setup)
    }

    /// Read, parse and validate a JSON setup file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate tracking parameters and the detector description.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracking.validate()?;
        self.detector.build_geometry()?;
        Ok(())
    }
}
