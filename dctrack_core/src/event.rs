//! Per-event input records: drift-corrected hits and chamber space points.
//!
//! Both are produced upstream (hit decoding, drift-distance conversion and
//! per-chamber space-point finding). The tracking core only reads them.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

/// A single drift-chamber hit after drift-distance correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcHit {
    /// Plane number (1-based, index into the geometry table)
    pub plane: usize,

    /// Wire number within the plane
    pub wire: u32,

    /// Drift-corrected coordinate measured by the plane (cm)
    pub coord: f64,
}

impl DcHit {
    pub fn new(plane: usize, wire: u32, coord: f64) -> Self {
        Self { plane, wire, coord }
    }
}

/// A local stub reconstructed inside one chamber.
///
/// The stub is expressed at the common focal-plane reference so stubs from
/// different chambers can be compared component by component:
/// `[x, y, xp, yp]` with `xp`/`yp` the tangents of the track slopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacePoint {
    /// Owning chamber (1-based)
    pub chamber: usize,

    /// Stub vector [x, y, xp, yp]
    pub stub: Vector4<f64>,

    /// Constituent hits, in the order the chamber produced them
    pub hits: Vec<DcHit>,
}

impl SpacePoint {
    pub fn new(chamber: usize, stub: Vector4<f64>, hits: Vec<DcHit>) -> Self {
        Self { chamber, stub, hits }
    }

    /// Number of constituent hits.
    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }
}

/// Flattens per-chamber space-point lists into the event-wide list the
/// linker consumes, stamping each point with its chamber number.
///
/// `chambers[0]` holds chamber 1's points, `chambers[1]` chamber 2's, and so
/// on. The flat order is chamber-major, matching the linker's iteration
/// order.
pub fn flatten_chambers(chambers: Vec<Vec<SpacePoint>>) -> Vec<SpacePoint> {
    chambers
        .into_iter()
        .enumerate()
        .flat_map(|(idx, points)| {
            points.into_iter().map(move |mut sp| {
                sp.chamber = idx + 1;
                sp
            })
        })
        .collect()
}
