//! Per-event tracking engine.
//!
//! Runs the coarse-tracking sequence for one event: link stubs, fit every
//! candidate, then (single-stub mode only) compute double residuals. The
//! engine owns only immutable state, so one instance can serve any number
//! of per-event workers.

use crate::config::{SetupConfig, TrackingConfig};
use crate::error::{ConfigError, LinkError};
use crate::event::SpacePoint;
use crate::fitting::TrackFitter;
use crate::geometry::PlaneGeometryTable;
use crate::linking::{StubDiagnostics, StubLinker};
use crate::track::DcTrack;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// How the linking stage of an event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// At least one candidate track was built
    Linked,

    /// No pair of space points satisfied the link criteria
    NoCandidates,

    /// The candidate bound was exceeded; the event has no tracks
    Aborted { max_tracks: usize },
}

/// Everything the engine produces for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    /// Candidate tracks in creation order, fit results attached
    pub tracks: Vec<DcTrack>,

    pub status: LinkStatus,

    /// Closest cross-chamber stub agreement
    pub diagnostics: StubDiagnostics,

    /// Whether single-stub double residuals were filled in
    pub double_residuals: bool,
}

impl EventResult {
    /// Fitted track with the lowest chi-square per degree of freedom.
    pub fn best_track(&self) -> Option<&DcTrack> {
        self.tracks
            .iter()
            .filter_map(|t| t.reduced_chi2().map(|chi2| (t, chi2)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t)
    }

    /// Number of tracks that were successfully fit.
    pub fn num_fitted(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_fitted()).count()
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, LinkStatus::Aborted { .. })
    }
}

/// Drift-chamber tracking engine.
#[derive(Debug, Clone)]
pub struct DcTracker {
    geometry: Arc<PlaneGeometryTable>,
    config: TrackingConfig,
}

impl DcTracker {
    /// Creates an engine over a shared geometry table.
    pub fn new(geometry: Arc<PlaneGeometryTable>, config: TrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { geometry, config })
    }

    /// Builds the geometry table from a setup and creates an engine.
    pub fn from_setup(setup: &SetupConfig) -> Result<Self, ConfigError> {
        let geometry = setup.detector.build_geometry()?;
        Self::new(Arc::new(geometry), setup.tracking.clone())
    }

    pub fn geometry(&self) -> &Arc<PlaneGeometryTable> {
        &self.geometry
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// A fitter bound to this engine's geometry.
    pub fn fitter(&self) -> TrackFitter<'_> {
        // The map was validated in `new`
        TrackFitter::with_checked_map(&self.geometry, self.config.ray_coeff_map)
    }

    /// Track one event.
    ///
    /// Link failures never escape: an overflow yields an empty, aborted
    /// result and the caller simply moves on to the next event.
    pub fn process_event(&self, space_points: &[SpacePoint]) -> EventResult {
        let linker = StubLinker::new(&self.config, self.geometry.num_planes());
        let mut diagnostics = StubDiagnostics::default();

        let mut tracks = match linker.link(space_points, &mut diagnostics) {
            Ok(tracks) => tracks,
            Err(LinkError::TooManyTracks { max }) => {
                warn!(
                    "Too many tracks found (max {}) from {} space points, event skipped",
                    max,
                    space_points.len()
                );
                return EventResult {
                    tracks: Vec::new(),
                    status: LinkStatus::Aborted { max_tracks: max },
                    diagnostics,
                    double_residuals: false,
                };
            }
        };

        if tracks.is_empty() {
            return EventResult {
                tracks,
                status: LinkStatus::NoCandidates,
                diagnostics,
                double_residuals: false,
            };
        }

        let fitter = self.fitter();
        for track in tracks.iter_mut() {
            fitter.fit_track(track);
        }

        let double_residuals = self.config.single_stub && fitter.double_residuals(&mut tracks);

        debug!(
            "Event: {} space points, {} tracks, {} fitted",
            space_points.len(),
            tracks.len(),
            tracks.iter().filter(|t| t.is_fitted()).count()
        );

        EventResult {
            tracks,
            status: LinkStatus::Linked,
            diagnostics,
            double_residuals,
        }
    }
}
