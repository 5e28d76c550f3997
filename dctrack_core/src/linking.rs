//! The stub linker - combines space points across chambers into
//! candidate tracks.
//!
//! Linking is a single deterministic left-to-right pass (first fit, not best
//! fit):
//! 1. Every space point not already on a track seeds a search
//! 2. Each later point from another chamber whose stub agrees with the seed
//!    within all four tolerances is linked
//! 3. The first link creates a track; later links extend every track of
//!    that seed, or fork a copy when the track already holds a point from
//!    the same chamber
//! 4. Hits of the member space points are aggregated onto each track
//!
//! Exceeding the track bound aborts the whole event.

use crate::config::{LinkCriteria, TrackingConfig};
use crate::error::LinkError;
use crate::event::SpacePoint;
use crate::track::DcTrack;
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Starting value of every closest-delta component.
pub const STUB_DELTA_UNSET: f64 = 999_999.0;

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Closest stub agreement seen over all cross-chamber pairs of an event.
///
/// Each component keeps the signed delta with the smallest magnitude,
/// independently of the others. Used for linking-efficiency studies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StubDiagnostics {
    pub min_dx: f64,
    pub min_dy: f64,
    pub min_dxp: f64,
    pub min_dyp: f64,

    /// Cross-chamber pairs compared
    pub pairs_tested: usize,
}

impl Default for StubDiagnostics {
    fn default() -> Self {
        Self {
            min_dx: STUB_DELTA_UNSET,
            min_dy: STUB_DELTA_UNSET,
            min_dxp: STUB_DELTA_UNSET,
            min_dyp: STUB_DELTA_UNSET,
            pairs_tested: 0,
        }
    }
}

impl StubDiagnostics {
    fn record(&mut self, delta: &Vector4<f64>) {
        fn keep_closest(current: &mut f64, candidate: f64) {
            if candidate.abs() < current.abs() {
                *current = candidate;
            }
        }

        keep_closest(&mut self.min_dx, delta[0]);
        keep_closest(&mut self.min_dy, delta[1]);
        keep_closest(&mut self.min_dxp, delta[2]);
        keep_closest(&mut self.min_dyp, delta[3]);
        self.pairs_tested += 1;
    }
}

// ============================================================================
// STUB LINKER
// ============================================================================

/// Builds candidate tracks from an event's flat space-point list.
#[derive(Debug, Clone)]
pub struct StubLinker {
    criteria: LinkCriteria,
    max_tracks: usize,
    single_stub: bool,
    num_planes: usize,
}

impl StubLinker {
    /// Create a linker producing tracks sized for `num_planes` planes.
    pub fn new(config: &TrackingConfig, num_planes: usize) -> Self {
        Self {
            criteria: config.criteria,
            max_tracks: config.effective_max_tracks(),
            single_stub: config.single_stub,
            num_planes,
        }
    }

    /// The candidate-track bound in force.
    pub fn max_tracks(&self) -> usize {
        self.max_tracks
    }

    /// Link the event's space points into candidate tracks with their hit
    /// lists attached.
    ///
    /// On [`LinkError::TooManyTracks`] every candidate found so far is
    /// discarded. `diagnostics` is filled in either way.
    pub fn link(
        &self,
        space_points: &[SpacePoint],
        diagnostics: &mut StubDiagnostics,
    ) -> Result<Vec<DcTrack>, LinkError> {
        let mut tracks = if self.single_stub {
            self.link_single_stubs(space_points)?
        } else {
            self.link_across_chambers(space_points, diagnostics)?
        };

        attach_hits(&mut tracks, space_points);

        debug!("Linked {} space points into {} tracks", space_points.len(), tracks.len());
        Ok(tracks)
    }

    /// One track per space point, no linking.
    fn link_single_stubs(&self, space_points: &[SpacePoint]) -> Result<Vec<DcTrack>, LinkError> {
        if space_points.len() > self.max_tracks {
            debug!(
                "Single-stub mode: {} space points exceed {} tracks",
                space_points.len(),
                self.max_tracks
            );
            return Err(LinkError::TooManyTracks {
                max: self.max_tracks,
            });
        }

        Ok((0..space_points.len())
            .map(|id| {
                let mut track = DcTrack::new(self.num_planes);
                track.add_space_point(id);
                track
            })
            .collect())
    }

    fn link_across_chambers(
        &self,
        space_points: &[SpacePoint],
        diagnostics: &mut StubDiagnostics,
    ) -> Result<Vec<DcTrack>, LinkError> {
        let mut tracks: Vec<DcTrack> = Vec::new();

        for seed in 0..space_points.len().saturating_sub(1) {
            // A point already on a track never seeds again
            if tracks.iter().any(|t| t.contains_space_point(seed)) {
                continue;
            }

            // Indices of the tracks this seed has produced
            let mut seeded: Vec<usize> = Vec::new();

            for candidate in (seed + 1)..space_points.len() {
                if space_points[seed].chamber == space_points[candidate].chamber {
                    continue;
                }

                let delta = space_points[seed].stub - space_points[candidate].stub;
                diagnostics.record(&delta);
                trace!(
                    "sp {} vs {}: dx={:.4} dy={:.4} dxp={:.5} dyp={:.5}",
                    seed, candidate, delta[0], delta[1], delta[2], delta[3]
                );

                if !self.criteria.accepts(&delta) {
                    continue;
                }

                if seeded.is_empty() {
                    self.ensure_capacity(&tracks)?;
                    debug!("New track {} from sp {} + {}", tracks.len(), seed, candidate);
                    seeded.push(tracks.len());
                    tracks.push(DcTrack::with_pair(self.num_planes, seed, candidate));
                    continue;
                }

                // Forks made for this candidate already contain it, so only
                // the tracks that existed before it are visited.
                let existing = seeded.len();
                for k in 0..existing {
                    let index = seeded[k];
                    if tracks[index].contains_space_point(candidate) {
                        continue;
                    }

                    match same_chamber_position(&tracks[index], space_points, candidate) {
                        None => {
                            trace!("Track {} extended with sp {}", index, candidate);
                            tracks[index].add_space_point(candidate);
                        }
                        Some(position) => {
                            self.ensure_capacity(&tracks)?;
                            let fork = tracks[index].fork_replacing(position, candidate);
                            debug!(
                                "Track {} forked from track {} with sp {}",
                                tracks.len(),
                                index,
                                candidate
                            );
                            seeded.push(tracks.len());
                            tracks.push(fork);
                        }
                    }
                }
            }
        }

        Ok(tracks)
    }

    fn ensure_capacity(&self, tracks: &[DcTrack]) -> Result<(), LinkError> {
        if tracks.len() >= self.max_tracks {
            debug!("Too many tracks found (max {}), abandoning event", self.max_tracks);
            return Err(LinkError::TooManyTracks {
                max: self.max_tracks,
            });
        }
        Ok(())
    }
}

/// Position within `track` of a member from the same chamber as `candidate`.
fn same_chamber_position(
    track: &DcTrack,
    space_points: &[SpacePoint],
    candidate: usize,
) -> Option<usize> {
    let chamber = space_points[candidate].chamber;
    track
        .space_point_ids()
        .iter()
        .position(|&id| space_points[id].chamber == chamber)
}

/// Replace each track's hit list with the hits of its member space points.
fn attach_hits(tracks: &mut [DcTrack], space_points: &[SpacePoint]) {
    for track in tracks.iter_mut() {
        track.clear_hits();
        let hits: Vec<_> = track
            .space_point_ids()
            .iter()
            .flat_map(|&id| space_points[id].hits.iter().copied())
            .collect();
        for hit in hits {
            track.add_hit(hit);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DcHit;

    fn criteria() -> LinkCriteria {
        LinkCriteria {
            xt: 0.01,
            yt: 0.01,
            xpt: 0.001,
            ypt: 0.001,
        }
    }

    fn config(max_tracks: usize) -> TrackingConfig {
        TrackingConfig {
            criteria: criteria(),
            max_tracks,
            ..Default::default()
        }
    }

    fn sp(chamber: usize, stub: [f64; 4], planes: &[usize]) -> SpacePoint {
        let hits = planes
            .iter()
            .map(|&plane| DcHit::new(plane, plane as u32, stub[0] + plane as f64))
            .collect();
        SpacePoint::new(chamber, Vector4::from(stub), hits)
    }

    fn link(config: &TrackingConfig, sps: &[SpacePoint]) -> Result<Vec<DcTrack>, LinkError> {
        let mut diagnostics = StubDiagnostics::default();
        StubLinker::new(config, 12).link(sps, &mut diagnostics)
    }

    #[test]
    fn test_close_stubs_link_into_one_track() {
        let sps = vec![
            sp(1, [1.0, 2.0, 0.01, 0.02], &[1, 2, 3]),
            sp(2, [1.001, 2.001, 0.0101, 0.0201], &[7, 8, 9]),
        ];

        let tracks = link(&config(10), &sps).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].space_point_ids(), &[0, 1]);
        assert_eq!(tracks[0].num_hits(), 6);
    }

    #[test]
    fn test_distant_stubs_do_not_link() {
        let sps = vec![
            sp(1, [1.0, 2.0, 0.01, 0.02], &[1]),
            sp(2, [1.5, 2.5, 0.51, 0.52], &[7]),
        ];

        let tracks = link(&config(10), &sps).unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_same_chamber_points_never_link() {
        let sps = vec![
            sp(1, [1.0, 2.0, 0.01, 0.02], &[1]),
            sp(1, [1.0, 2.0, 0.01, 0.02], &[2]),
        ];

        assert!(link(&config(10), &sps).unwrap().is_empty());
    }

    #[test]
    fn test_one_component_out_of_tolerance_rejects() {
        let sps = vec![
            sp(1, [0.0, 0.0, 0.0, 0.0], &[1]),
            sp(2, [0.0, 0.0, 0.0, 0.002], &[7]),
        ];

        assert!(link(&config(10), &sps).unwrap().is_empty());
    }

    #[test]
    fn test_third_chamber_extends_track() {
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(2, [0.001, 0.0, 0.0, 0.0], &[5]),
            sp(3, [0.002, 0.0, 0.0, 0.0], &[9]),
        ];

        let tracks = link(&config(10), &sps).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].space_point_ids(), &[0, 1, 2]);
    }

    #[test]
    fn test_extended_track_fits_bound_of_one() {
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(2, [0.001, 0.0, 0.0, 0.0], &[5]),
            sp(3, [0.002, 0.0, 0.0, 0.0], &[9]),
        ];

        let tracks = link(&config(1), &sps).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].space_point_ids(), &[0, 1, 2]);
        assert_eq!(tracks[0].num_hits(), 3);
    }

    #[test]
    fn test_same_chamber_conflict_forks() {
        let sps = vec![
            sp(1, [0.0; 4], &[1, 2]),
            sp(2, [0.001, 0.0, 0.0, 0.0], &[7]),
            sp(2, [0.002, 0.0, 0.0, 0.0], &[8]),
        ];

        let tracks = link(&config(10), &sps).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].space_point_ids(), &[0, 1]);
        assert_eq!(tracks[1].space_point_ids(), &[0, 2]);

        // Each track carries only its own members' hits
        let planes: Vec<_> = tracks[1].hits().iter().map(|h| h.plane).collect();
        assert_eq!(planes, vec![1, 2, 8]);
    }

    #[test]
    fn test_fork_then_extend_both() {
        // Chamber 2 conflict forks; a later chamber 3 point extends both
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(2, [0.001, 0.0, 0.0, 0.0], &[5]),
            sp(2, [0.002, 0.0, 0.0, 0.0], &[6]),
            sp(3, [0.003, 0.0, 0.0, 0.0], &[9]),
        ];

        let tracks = link(&config(10), &sps).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].space_point_ids(), &[0, 1, 3]);
        assert_eq!(tracks[1].space_point_ids(), &[0, 2, 3]);
    }

    #[test]
    fn test_consumed_point_does_not_reseed() {
        // sp 1 is on track 0 so it never seeds, even though it would link sp 2
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(2, [0.006, 0.0, 0.0, 0.0], &[5]),
            sp(3, [0.015, 0.0, 0.0, 0.0], &[9]),
        ];

        let tracks = link(&config(10), &sps).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].space_point_ids(), &[0, 1]);
    }

    #[test]
    fn test_fork_overflow_aborts_event() {
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(2, [0.001, 0.0, 0.0, 0.0], &[5]),
            sp(2, [0.002, 0.0, 0.0, 0.0], &[6]),
        ];

        let err = link(&config(1), &sps).unwrap_err();
        assert_eq!(err, LinkError::TooManyTracks { max: 1 });
    }

    #[test]
    fn test_second_seed_overflow_aborts_event() {
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(1, [5.0, 0.0, 0.0, 0.0], &[2]),
            sp(2, [0.001, 0.0, 0.0, 0.0], &[7]),
            sp(2, [5.001, 0.0, 0.0, 0.0], &[8]),
        ];

        assert_eq!(link(&config(2), &sps).unwrap().len(), 2);
        assert!(link(&config(1), &sps).is_err());
    }

    #[test]
    fn test_single_stub_mode() {
        let config = TrackingConfig {
            single_stub: true,
            ..config(10)
        };
        // Identical stubs: would link, but single-stub mode never links
        let sps = vec![sp(1, [0.0; 4], &[1, 2]), sp(2, [0.0; 4], &[7, 8, 9])];

        let tracks = link(&config, &sps).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].space_point_ids(), &[0]);
        assert_eq!(tracks[1].space_point_ids(), &[1]);
        assert_eq!(tracks[0].hits(), sps[0].hits.as_slice());
        assert_eq!(tracks[1].hits(), sps[1].hits.as_slice());
    }

    #[test]
    fn test_single_stub_overflow() {
        let config = TrackingConfig {
            single_stub: true,
            ..config(2)
        };
        let sps = vec![sp(1, [0.0; 4], &[1]), sp(2, [0.0; 4], &[7]), sp(2, [1.0; 4], &[8])];

        assert_eq!(
            link(&config, &sps).unwrap_err(),
            LinkError::TooManyTracks { max: 2 }
        );
        assert_eq!(link(&config, &sps[..2]).unwrap().len(), 2);
    }

    #[test]
    fn test_diagnostics_keep_closest_signed_delta() {
        let sps = vec![
            sp(1, [0.0; 4], &[1]),
            sp(2, [0.3, -0.2, 0.05, 0.4], &[7]),
            sp(2, [-0.1, 0.6, -0.02, 0.5], &[8]),
        ];

        let mut diagnostics = StubDiagnostics::default();
        StubLinker::new(&config(10), 12)
            .link(&sps, &mut diagnostics)
            .unwrap();

        assert_eq!(diagnostics.pairs_tested, 2);
        assert_eq!(diagnostics.min_dx, 0.1);
        assert_eq!(diagnostics.min_dy, 0.2);
        assert_eq!(diagnostics.min_dxp, 0.02);
        assert_eq!(diagnostics.min_dyp, -0.4);
    }

    #[test]
    fn test_empty_event() {
        assert!(link(&config(10), &[]).unwrap().is_empty());
        let mut diagnostics = StubDiagnostics::default();
        StubLinker::new(&config(10), 12)
            .link(&[], &mut diagnostics)
            .unwrap();
        assert_eq!(diagnostics, StubDiagnostics::default());
    }
}
