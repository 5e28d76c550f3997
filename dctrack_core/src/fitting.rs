//! The track fitter - weighted linear least squares for focal-plane rays.
//!
//! Each hit measures one coordinate that is linear in the ray parameters
//! through four entries of its plane's coefficient vector. The fit solves
//! the 4x4 normal equations
//!
//! ```text
//! A[k][l] = Σ c[p][map[k]] * c[p][map[l]] / σp²
//! T[k]    = Σ u * c[p][map[k]] / σp²
//! ray     = A⁻¹ T
//! ```

use crate::error::{FitError, GeometryError};
use crate::event::DcHit;
use crate::geometry::{validate_ray_coeff_map, PlaneGeometryTable, NUM_RAY_PARAMS};
use crate::projection::Ray;
use crate::track::{degrees_of_freedom, DcTrack, FitStatus};
use nalgebra::{Matrix4, Vector4};
use tracing::{debug, trace};

/// Fits candidate tracks against a shared geometry table.
#[derive(Debug, Clone, Copy)]
pub struct TrackFitter<'a> {
    geometry: &'a PlaneGeometryTable,
    ray_coeff_map: [usize; NUM_RAY_PARAMS],
}

impl<'a> TrackFitter<'a> {
    /// Fails with [`GeometryError::CoefficientIndex`] if `ray_coeff_map`
    /// points past the plane coefficient vector.
    pub fn new(
        geometry: &'a PlaneGeometryTable,
        ray_coeff_map: [usize; NUM_RAY_PARAMS],
    ) -> Result<Self, GeometryError> {
        validate_ray_coeff_map(&ray_coeff_map)?;
        Ok(Self::with_checked_map(geometry, ray_coeff_map))
    }

    /// For maps already checked by [`crate::TrackingConfig::validate`].
    pub(crate) fn with_checked_map(
        geometry: &'a PlaneGeometryTable,
        ray_coeff_map: [usize; NUM_RAY_PARAMS],
    ) -> Self {
        Self {
            geometry,
            ray_coeff_map,
        }
    }

    /// The four coefficients of `plane` that multiply `[x, y, xp, yp]`.
    fn ray_coefficients(&self, plane: usize) -> Result<(Vector4<f64>, f64), FitError> {
        let geometry = self.geometry.plane(plane).ok_or(FitError::UnknownPlane(plane))?;
        let c = &geometry.coefficients;
        let m = &self.ray_coeff_map;
        Ok((
            Vector4::new(c[m[0]], c[m[1]], c[m[2]], c[m[3]]),
            geometry.weight(),
        ))
    }

    // ========================================================================
    // NORMAL EQUATIONS
    // ========================================================================

    /// Solve the weighted normal equations for the ray best describing
    /// `hits`.
    ///
    /// Needs at least four hits. A matrix without an inverse, or one whose
    /// inverse yields non-finite parameters, is reported as
    /// [`FitError::Singular`]; no conditioning threshold is applied.
    pub fn solve_ray(&self, hits: &[DcHit]) -> Result<Ray, FitError> {
        if hits.len() < NUM_RAY_PARAMS {
            return Err(FitError::Underconstrained { hits: hits.len() });
        }

        let mut tt = Vector4::<f64>::zeros();
        let mut aa = Matrix4::<f64>::zeros();

        for hit in hits {
            let (coeffs, weight) = self.ray_coefficients(hit.plane)?;
            tt += coeffs * (hit.coord * weight);
            for k in 0..NUM_RAY_PARAMS {
                for l in k..NUM_RAY_PARAMS {
                    aa[(k, l)] += coeffs[k] * coeffs[l] * weight;
                }
            }
        }

        // Symmetric by construction
        for k in 0..NUM_RAY_PARAMS {
            for l in 0..k {
                aa[(k, l)] = aa[(l, k)];
            }
        }

        let inverse = aa.try_inverse().ok_or(FitError::Singular)?;
        let ray = inverse * tt;

        if ray.iter().all(|v| v.is_finite()) {
            Ok(ray)
        } else {
            Err(FitError::Singular)
        }
    }

    // ========================================================================
    // TRACK FIT
    // ========================================================================

    /// Fit one candidate track in place.
    ///
    /// Tracks with `hits - 4 <= 0` degrees of freedom are skipped and keep
    /// the sentinel chi-square; so are tracks whose matrix is singular or
    /// whose hits reference unknown planes. On success every plane gets a
    /// fitted coordinate and every hit plane a residual.
    pub fn fit_track(&self, track: &mut DcTrack) {
        track.reset_fit();
        let nfree = degrees_of_freedom(track.num_hits());
        track.set_nfree(nfree);

        if nfree <= 0 {
            debug!("Track with {} hits not fit (nfree = {})", track.num_hits(), nfree);
            track.mark_unfit(FitStatus::Underconstrained);
            return;
        }

        let ray = match self.solve_ray(track.hits()) {
            Ok(ray) => ray,
            Err(err) => {
                debug!("Track fit failed: {}", err);
                track.mark_unfit(err.into());
                return;
            }
        };

        for (plane, geometry) in self.geometry.iter() {
            let c = &geometry.coefficients;
            let coord: f64 = self
                .ray_coeff_map
                .iter()
                .zip(ray.iter())
                .map(|(&idx, value)| c[idx] * value)
                .sum();
            track.set_coord(plane, coord);
        }

        // Planes were checked by solve_ray
        let residuals: Vec<(usize, f64, f64)> = track
            .hits()
            .iter()
            .filter_map(|hit| {
                let coord = track.coord(hit.plane)?;
                let sigma = self.geometry.plane(hit.plane)?.sigma;
                let residual = hit.coord - coord;
                trace!(
                    "plane {:>3}  coord {:>10.5}  fit {:>10.5}  residual {:>9.5}",
                    hit.plane,
                    hit.coord,
                    coord,
                    residual
                );
                Some((hit.plane, residual, sigma))
            })
            .collect();

        let mut chi2 = 0.0;
        for (plane, residual, sigma) in residuals {
            track.set_residual(plane, residual);
            chi2 += (residual / sigma).powi(2);
        }

        track.set_fitted(&ray, chi2);
        debug!(
            "Fitted ray x={:.4} y={:.4} xp={:.5} yp={:.5} chi2={:.3} nfree={}",
            ray[0], ray[1], ray[2], ray[3], chi2, nfree
        );
    }

    // ========================================================================
    // DOUBLE RESIDUALS (Single-Stub Mode)
    // ========================================================================

    /// Cross-chamber residuals for exactly two single-chamber tracks.
    ///
    /// The first track must start with a chamber 1 hit and the second with a
    /// chamber 2 hit, and both must be fitted. Each track then receives, on
    /// the planes of the other track's hits, the difference between those
    /// hits and its own ray's prediction. Any other topology is skipped.
    ///
    /// Returns whether double residuals were computed.
    pub fn double_residuals(&self, tracks: &mut [DcTrack]) -> bool {
        let [first, second] = tracks else {
            return false;
        };

        let first_chamber = self.first_hit_chamber(first);
        let second_chamber = self.first_hit_chamber(second);
        if first_chamber != Some(1) || second_chamber != Some(2) {
            return false;
        }

        let (Some(ray1), Some(ray2)) = (first.fitted_ray(), second.fitted_ray()) else {
            return false;
        };

        for hit in second.hits() {
            if let Some(plane) = self.geometry.plane(hit.plane) {
                first.set_double_residual(hit.plane, hit.coord - plane.project(&ray1));
            }
        }
        for hit in first.hits() {
            if let Some(plane) = self.geometry.plane(hit.plane) {
                second.set_double_residual(hit.plane, hit.coord - plane.project(&ray2));
            }
        }

        true
    }

    fn first_hit_chamber(&self, track: &DcTrack) -> Option<usize> {
        track
            .hits()
            .first()
            .and_then(|hit| self.geometry.chamber_of(hit.plane))
    }
}
