//! DcTrack Core - Drift-Chamber Stub Linking and Focal-Plane Track Fitting
//!
//! Reconstructs straight particle trajectories through a multi-chamber wire
//! tracking detector, one event at a time:
//! 1. **Linking**: space points from different chambers whose local stubs
//!    agree within tolerance are combined into candidate tracks
//! 2. **Fitting**: each candidate's hits are fit to the focal-plane ray
//!    `(x, y, xp, yp)` by weighted linear least squares
//! 3. **Double residuals**: in single-stub mode, each chamber's hits are
//!    compared against the other chamber's independent ray
//!
//! The plane geometry table is immutable after setup and can be shared
//! across workers; everything else is per event.

pub mod config;
pub mod error;
pub mod event;
pub mod fitting;
pub mod geometry;
pub mod linking;
pub mod projection;
pub mod track;
pub mod tracker;

// Re-export key types for convenience
pub use config::{DetectorConfig, LinkCriteria, SetupConfig, TrackingConfig};
pub use error::{ConfigError, FitError, GeometryError, LinkError};
pub use event::{flatten_chambers, DcHit, SpacePoint};
pub use fitting::TrackFitter;
pub use geometry::{PlaneGeometry, PlaneGeometryTable};
pub use linking::{StubDiagnostics, StubLinker};
pub use projection::{dpsi, Ray};
pub use track::{DcTrack, FitStatus};
pub use tracker::{DcTracker, EventResult, LinkStatus};
