//! Plane geometry table.
//!
//! Loaded once per configuration epoch and shared read-only by the linker,
//! the fitter and any number of per-event workers (wrap it in an `Arc`).

use crate::error::GeometryError;
use crate::projection::{dpsi, Ray, NUM_PLANE_COEFFS};
use serde::{Deserialize, Serialize};

/// Number of fitted focal-plane ray parameters.
pub const NUM_RAY_PARAMS: usize = 4;

/// Positions of `[x, y, xp, yp]` inside each plane's coefficient vector.
pub const DEFAULT_RAY_COEFF_MAP: [usize; NUM_RAY_PARAMS] = [4, 5, 2, 3];

// ============================================================================
// PLANE GEOMETRY
// ============================================================================

/// Geometry and resolution of a single wire plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneGeometry {
    /// Owning chamber (1-based)
    pub chamber: usize,

    /// Coordinate uncertainty used to weight the fit (cm)
    pub sigma: f64,

    /// Ray-projection coefficients, see [`dpsi`]
    pub coefficients: [f64; NUM_PLANE_COEFFS],
}

impl PlaneGeometry {
    /// Plane with externally computed projection coefficients.
    pub fn from_coefficients(
        chamber: usize,
        sigma: f64,
        coefficients: [f64; NUM_PLANE_COEFFS],
    ) -> Self {
        Self {
            chamber,
            sigma,
            coefficients,
        }
    }

    /// Ideal plane normal to the optical axis at `z`, measuring
    /// `u = cos(alpha) * X + sin(alpha) * Y` (alpha in radians).
    ///
    /// The projection is linear: `c8 = 1` and all cross terms vanish.
    pub fn ideal(chamber: usize, sigma: f64, z: f64, alpha: f64) -> Self {
        let (sin_a, cos_a) = alpha.sin_cos();
        let mut coefficients = [0.0; NUM_PLANE_COEFFS];
        coefficients[2] = z * cos_a;
        coefficients[3] = z * sin_a;
        coefficients[4] = cos_a;
        coefficients[5] = sin_a;
        coefficients[8] = 1.0;

        Self {
            chamber,
            sigma,
            coefficients,
        }
    }

    /// Fit weight `1 / sigma²`.
    #[inline]
    pub fn weight(&self) -> f64 {
        1.0 / self.sigma.powi(2)
    }

    /// Coordinate at which `ray` crosses this plane.
    #[inline]
    pub fn project(&self, ray: &Ray) -> f64 {
        dpsi(ray, &self.coefficients)
    }
}

// ============================================================================
// GEOMETRY TABLE
// ============================================================================

/// Immutable per-run table of all planes, indexed by 1-based plane number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneGeometryTable {
    planes: Vec<PlaneGeometry>,
    num_chambers: usize,
}

impl PlaneGeometryTable {
    /// Validate and build the table. `planes[0]` is plane 1.
    pub fn new(planes: Vec<PlaneGeometry>, num_chambers: usize) -> Result<Self, GeometryError> {
        if planes.is_empty() {
            return Err(GeometryError::EmptyTable);
        }

        for (idx, plane) in planes.iter().enumerate() {
            let number = idx + 1;
            if plane.chamber == 0 || plane.chamber > num_chambers {
                return Err(GeometryError::InvalidChamber {
                    plane: number,
                    chamber: plane.chamber,
                    num_chambers,
                });
            }
            if !plane.sigma.is_finite() || plane.sigma <= 0.0 {
                return Err(GeometryError::InvalidSigma {
                    plane: number,
                    sigma: plane.sigma,
                });
            }
            if plane.coefficients.iter().any(|c| !c.is_finite()) {
                return Err(GeometryError::NonFiniteCoefficients { plane: number });
            }
        }

        Ok(Self {
            planes,
            num_chambers,
        })
    }

    /// Total number of planes.
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Number of chambers.
    pub fn num_chambers(&self) -> usize {
        self.num_chambers
    }

    /// Geometry of a plane by 1-based number.
    pub fn plane(&self, plane: usize) -> Option<&PlaneGeometry> {
        plane.checked_sub(1).and_then(|idx| self.planes.get(idx))
    }

    /// Chamber that owns `plane`.
    pub fn chamber_of(&self, plane: usize) -> Option<usize> {
        self.plane(plane).map(|p| p.chamber)
    }

    /// Plane numbers belonging to `chamber`, in increasing order.
    pub fn planes_in_chamber(&self, chamber: usize) -> impl Iterator<Item = usize> + '_ {
        self.iter()
            .filter(move |(_, p)| p.chamber == chamber)
            .map(|(number, _)| number)
    }

    /// Iterate over `(plane number, geometry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PlaneGeometry)> {
        self.planes.iter().enumerate().map(|(idx, p)| (idx + 1, p))
    }
}

/// Check a ray-parameter map against the coefficient vector length.
pub fn validate_ray_coeff_map(map: &[usize; NUM_RAY_PARAMS]) -> Result<(), GeometryError> {
    match map.iter().find(|&&idx| idx >= NUM_PLANE_COEFFS) {
        Some(&idx) => Err(GeometryError::CoefficientIndex(idx)),
        None => Ok(()),
    }
}
