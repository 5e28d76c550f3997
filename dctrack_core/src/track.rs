//! Candidate drift-chamber track ("DC track").
//!
//! Membership (space points and their hits) is fixed by the linker; the
//! fitter then attaches the ray, per-plane coordinates, residuals and
//! chi-square.

use crate::event::DcHit;
use crate::error::FitError;
use crate::geometry::NUM_RAY_PARAMS;
use crate::projection::Ray;
use nalgebra::Vector5;
use serde::{Deserialize, Serialize};

/// Chi-square assigned to tracks that were not (or could not be) fit.
pub const CHI2_UNFIT: f64 = 1.0e4;

/// Residual and double-residual value for planes that received none.
pub const RESIDUAL_UNSET: f64 = 1000.0;

/// Outcome of the track fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Fitter has not run yet
    Pending,

    /// Ray, residuals and chi-square are valid
    Fitted,

    /// Degrees of freedom <= 0, fit skipped
    Underconstrained,

    /// Normal-equations matrix not invertible
    Singular,

    /// A hit references a plane outside the geometry table
    UnknownPlane(usize),
}

impl From<FitError> for FitStatus {
    fn from(err: FitError) -> Self {
        match err {
            FitError::Underconstrained { .. } => FitStatus::Underconstrained,
            FitError::Singular => FitStatus::Singular,
            FitError::UnknownPlane(plane) => FitStatus::UnknownPlane(plane),
        }
    }
}

/// A candidate track linking at most one space point per chamber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcTrack {
    /// Indices into the event's flat space-point list
    space_points: Vec<usize>,

    /// Hits aggregated from the member space points
    hits: Vec<DcHit>,

    /// Fitted vector [x, y, (unused), xp, yp]
    vector: Vector5<f64>,

    /// Fitted coordinate on every plane (index = plane - 1)
    coords: Vec<f64>,

    /// Single residual per plane (index = plane - 1)
    residuals: Vec<f64>,

    /// Residual against the other chamber's track, single-stub mode only
    double_residuals: Vec<f64>,

    /// Hits minus fitted parameters
    nfree: i32,

    chi2: f64,

    status: FitStatus,
}

impl DcTrack {
    /// Empty track sized for `num_planes` planes.
    pub fn new(num_planes: usize) -> Self {
        Self {
            space_points: Vec::new(),
            hits: Vec::new(),
            vector: Vector5::zeros(),
            coords: vec![0.0; num_planes],
            residuals: vec![RESIDUAL_UNSET; num_planes],
            double_residuals: vec![RESIDUAL_UNSET; num_planes],
            nfree: 0,
            chi2: CHI2_UNFIT,
            status: FitStatus::Pending,
        }
    }

    /// Track seeded with two linked space points.
    pub(crate) fn with_pair(num_planes: usize, seed: usize, partner: usize) -> Self {
        let mut track = Self::new(num_planes);
        track.add_space_point(seed);
        track.add_space_point(partner);
        track
    }

    // ========================================================================
    // MEMBERSHIP
    // ========================================================================

    pub fn add_space_point(&mut self, id: usize) {
        self.space_points.push(id);
    }

    pub fn space_point_ids(&self) -> &[usize] {
        &self.space_points
    }

    pub fn num_space_points(&self) -> usize {
        self.space_points.len()
    }

    pub fn contains_space_point(&self, id: usize) -> bool {
        self.space_points.contains(&id)
    }

    /// Copy of this track's membership with the point at `position`
    /// replaced by `replacement`. Hits and fit results are not copied.
    pub(crate) fn fork_replacing(&self, position: usize, replacement: usize) -> Self {
        let mut fork = Self::new(self.coords.len());
        for (idx, &id) in self.space_points.iter().enumerate() {
            fork.add_space_point(if idx == position { replacement } else { id });
        }
        fork
    }

    pub fn clear_hits(&mut self) {
        self.hits.clear();
    }

    pub fn add_hit(&mut self, hit: DcHit) {
        self.hits.push(hit);
    }

    pub fn hits(&self) -> &[DcHit] {
        &self.hits
    }

    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }

    // ========================================================================
    // FIT RESULTS
    // ========================================================================

    /// Number of planes the per-plane arrays are sized for.
    pub fn num_planes(&self) -> usize {
        self.coords.len()
    }

    /// Clear fit results back to their sentinels.
    pub(crate) fn reset_fit(&mut self) {
        self.vector = Vector5::zeros();
        self.coords.iter_mut().for_each(|c| *c = 0.0);
        self.residuals.iter_mut().for_each(|r| *r = RESIDUAL_UNSET);
        self.double_residuals.iter_mut().for_each(|r| *r = RESIDUAL_UNSET);
        self.chi2 = CHI2_UNFIT;
        self.status = FitStatus::Pending;
    }

    pub(crate) fn set_nfree(&mut self, nfree: i32) {
        self.nfree = nfree;
    }

    pub(crate) fn mark_unfit(&mut self, status: FitStatus) {
        self.chi2 = CHI2_UNFIT;
        self.status = status;
    }

    pub(crate) fn set_fitted(&mut self, ray: &Ray, chi2: f64) {
        self.vector = Vector5::new(ray[0], ray[1], 0.0, ray[2], ray[3]);
        self.chi2 = chi2;
        self.status = FitStatus::Fitted;
    }

    /// Store a value at a 1-based plane, ignoring planes out of range.
    fn set_plane(values: &mut [f64], plane: usize, value: f64) {
        if let Some(slot) = plane.checked_sub(1).and_then(|idx| values.get_mut(idx)) {
            *slot = value;
        }
    }

    fn get_plane(values: &[f64], plane: usize) -> Option<f64> {
        plane.checked_sub(1).and_then(|idx| values.get(idx)).copied()
    }

    pub(crate) fn set_coord(&mut self, plane: usize, coord: f64) {
        Self::set_plane(&mut self.coords, plane, coord);
    }

    pub(crate) fn set_residual(&mut self, plane: usize, residual: f64) {
        Self::set_plane(&mut self.residuals, plane, residual);
    }

    pub(crate) fn set_double_residual(&mut self, plane: usize, residual: f64) {
        Self::set_plane(&mut self.double_residuals, plane, residual);
    }

    /// Fitted coordinate on a 1-based plane.
    pub fn coord(&self, plane: usize) -> Option<f64> {
        Self::get_plane(&self.coords, plane)
    }

    /// Residual on a 1-based plane ([`RESIDUAL_UNSET`] if the plane had no hit).
    pub fn residual(&self, plane: usize) -> Option<f64> {
        Self::get_plane(&self.residuals, plane)
    }

    /// Double residual on a 1-based plane.
    pub fn double_residual(&self, plane: usize) -> Option<f64> {
        Self::get_plane(&self.double_residuals, plane)
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn double_residuals(&self) -> &[f64] {
        &self.double_residuals
    }

    /// Five-slot fitted vector [x, y, 0, xp, yp].
    pub fn vector(&self) -> &Vector5<f64> {
        &self.vector
    }

    /// Four-parameter view `[x, y, xp, yp]` of the fitted vector.
    pub fn ray(&self) -> Ray {
        Ray::new(self.vector[0], self.vector[1], self.vector[3], self.vector[4])
    }

    /// The ray if the track was successfully fit.
    pub fn fitted_ray(&self) -> Option<Ray> {
        self.is_fitted().then(|| self.ray())
    }

    pub fn nfree(&self) -> i32 {
        self.nfree
    }

    pub fn chi2(&self) -> f64 {
        self.chi2
    }

    /// Chi-square per degree of freedom, `None` unless fitted.
    pub fn reduced_chi2(&self) -> Option<f64> {
        (self.is_fitted() && self.nfree > 0).then(|| self.chi2 / f64::from(self.nfree))
    }

    pub fn status(&self) -> FitStatus {
        self.status
    }

    pub fn is_fitted(&self) -> bool {
        self.status == FitStatus::Fitted
    }
}

/// Number of hits needed beyond the ray parameters for a fit to run.
pub(crate) fn degrees_of_freedom(num_hits: usize) -> i32 {
    num_hits as i32 - NUM_RAY_PARAMS as i32
}
