//! Ground truth oracle for simulation.
//!
//! The Oracle plays every upstream stage the tracking core does not own:
//! - Spawning straight-line rays at the focal plane (the truth)
//! - Digitizing them into smeared, possibly missing, plane hits
//! - Reducing each chamber's hits to a space point with a local stub
//! - Injecting noise space points

use dctrack_core::geometry::{validate_ray_coeff_map, NUM_RAY_PARAMS};
use dctrack_core::{
    flatten_chambers, DcHit, GeometryError, PlaneGeometryTable, Ray, SpacePoint, TrackFitter,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wire number assigned to coordinate 0.
const CENTRAL_WIRE: f64 = 64.0;

/// Ray and detector-response parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Spread of the ray position at the focal plane, x and y (cm)
    pub position_spread: [f64; 2],

    /// Spread of the ray slopes, xp and yp
    pub slope_spread: [f64; 2],

    /// Probability that a plane records a hit
    pub plane_efficiency: f64,

    /// Random space points added to each event
    pub noise_points: usize,

    /// Wire spacing used to label hits (cm)
    pub wire_pitch: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            position_spread: [10.0, 5.0],
            slope_spread: [0.03, 0.02],
            plane_efficiency: 1.0,
            noise_points: 0,
            wire_pitch: 1.0,
        }
    }
}

/// One synthetic event: truth rays and the space points they produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEvent {
    pub truth: Vec<Ray>,

    /// Flat, chamber-major list as handed to the tracker
    pub space_points: Vec<SpacePoint>,
}

/// The Oracle - generates ground truth and the detector's view of it.
pub struct Oracle {
    /// RNG for everything (rays, smearing, efficiency, noise)
    rng: ChaCha8Rng,

    geometry: Arc<PlaneGeometryTable>,

    ray_coeff_map: [usize; NUM_RAY_PARAMS],

    config: OracleConfig,
}

impl Oracle {
    /// Creates an Oracle with default response parameters.
    ///
    /// Rejects a `ray_coeff_map` that points past the plane coefficients.
    pub fn new(
        seed: u64,
        geometry: Arc<PlaneGeometryTable>,
        ray_coeff_map: [usize; NUM_RAY_PARAMS],
    ) -> Result<Self, GeometryError> {
        validate_ray_coeff_map(&ray_coeff_map)?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            geometry,
            ray_coeff_map,
            config: OracleConfig::default(),
        })
    }

    /// Replaces the response parameters.
    pub fn with_config(mut self, config: OracleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn gaussian(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        sigma * z
    }

    /// Draws a random ray from the configured spreads.
    pub fn spawn_ray(&mut self) -> Ray {
        let [sx, sy] = self.config.position_spread;
        let [sxp, syp] = self.config.slope_spread;
        Ray::new(
            self.gaussian(sx),
            self.gaussian(sy),
            self.gaussian(sxp),
            self.gaussian(syp),
        )
    }

    /// Smeared hits of `ray` on the planes of `chamber`, honouring plane
    /// efficiency.
    pub fn digitize(&mut self, ray: &Ray, chamber: usize) -> Vec<DcHit> {
        let geometry = Arc::clone(&self.geometry);
        let mut hits = Vec::new();

        for plane in geometry.planes_in_chamber(chamber) {
            let Some(plane_geometry) = geometry.plane(plane) else {
                continue;
            };
            if self.rng.gen::<f64>() >= self.config.plane_efficiency {
                continue;
            }

            let coord = plane_geometry.project(ray) + self.gaussian(plane_geometry.sigma);
            hits.push(DcHit::new(plane, self.wire_for(coord), coord));
        }

        hits
    }

    fn wire_for(&self, coord: f64) -> u32 {
        ((coord / self.config.wire_pitch).round() + CENTRAL_WIRE).max(1.0) as u32
    }

    /// Stand-in space-point finder: fits the chamber's own hits to a local
    /// ray and reports it as the stub. `None` if the hits cannot constrain
    /// a ray.
    pub fn find_space_point(&self, chamber: usize, hits: Vec<DcHit>) -> Option<SpacePoint> {
        let fitter = TrackFitter::new(&self.geometry, self.ray_coeff_map).ok()?;
        let stub = fitter.solve_ray(&hits).ok()?;
        Some(SpacePoint::new(chamber, stub, hits))
    }

    /// Generates an event with `num_tracks` truth rays plus the configured
    /// noise points.
    pub fn generate_event(&mut self, num_tracks: usize) -> GeneratedEvent {
        let num_chambers = self.geometry.num_chambers();
        let mut chambers: Vec<Vec<SpacePoint>> = vec![Vec::new(); num_chambers];
        let mut truth = Vec::with_capacity(num_tracks);

        for _ in 0..num_tracks {
            let ray = self.spawn_ray();
            for chamber in 1..=num_chambers {
                let hits = self.digitize(&ray, chamber);
                if let Some(sp) = self.find_space_point(chamber, hits) {
                    chambers[chamber - 1].push(sp);
                }
            }
            truth.push(ray);
        }

        for _ in 0..self.config.noise_points {
            let fake = self.spawn_ray();
            let chamber = self.rng.gen_range(1..=num_chambers);
            let hits = self.digitize(&fake, chamber);
            if let Some(sp) = self.find_space_point(chamber, hits) {
                let slot = &mut chambers[chamber - 1];
                let at = self.rng.gen_range(0..=slot.len());
                slot.insert(at, sp);
            }
        }

        GeneratedEvent {
            truth,
            space_points: flatten_chambers(chambers),
        }
    }
}
