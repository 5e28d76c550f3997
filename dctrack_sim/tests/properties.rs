//! Property tests for linking, fitting and projection.

use approx::assert_abs_diff_eq;
use dctrack_core::projection::{CINFINITY, INFINITY};
use dctrack_core::track::CHI2_UNFIT;
use dctrack_core::{
    dpsi, DcHit, DcTracker, DetectorConfig, LinkCriteria, LinkStatus, Ray, SetupConfig,
    SpacePoint, TrackingConfig,
};
use nalgebra::Vector4;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn tracker(max_tracks: usize) -> DcTracker {
    let geometry = Arc::new(DetectorConfig::hms_like().build_geometry().unwrap());
    let config = TrackingConfig {
        criteria: LinkCriteria {
            xt: 0.5,
            yt: 0.5,
            xpt: 0.02,
            ypt: 0.02,
        },
        max_tracks,
        ..Default::default()
    };
    DcTracker::new(geometry, config).unwrap()
}

fn ray_strategy() -> impl Strategy<Value = Ray> {
    (-20.0..20.0f64, -10.0..10.0f64, -0.05..0.05f64, -0.05..0.05f64)
        .prop_map(|(x, y, xp, yp)| Ray::new(x, y, xp, yp))
}

/// Space points with coarse stubs so that some pairs link and some do not.
fn space_points_strategy() -> impl Strategy<Value = Vec<SpacePoint>> {
    prop::collection::vec(
        (1..=3usize, 0..4i32, 0..4i32, 0..3i32, 0..3i32),
        0..8,
    )
    .prop_map(|points| {
        points
            .into_iter()
            .enumerate()
            .map(|(idx, (chamber, x, y, xp, yp))| {
                let stub = Vector4::new(
                    f64::from(x) * 0.4,
                    f64::from(y) * 0.4,
                    f64::from(xp) * 0.015,
                    f64::from(yp) * 0.015,
                );
                let hit = DcHit::new(chamber, idx as u32, idx as f64);
                SpacePoint::new(chamber, stub, vec![hit])
            })
            .collect()
    })
}

fn three_chamber_tracker(max_tracks: usize) -> DcTracker {
    let json = r#"{
        "detector": {
            "num_chambers": 3,
            "planes": [
                { "name": "1x", "chamber": 1, "sigma": 0.02, "z": -50.0, "alpha": 0.0 },
                { "name": "2x", "chamber": 2, "sigma": 0.02, "z": 0.0, "alpha": 0.0 },
                { "name": "3x", "chamber": 3, "sigma": 0.02, "z": 50.0, "alpha": 0.0 }
            ]
        }
    }"#;
    let mut setup = SetupConfig::from_json_str(json).unwrap();
    setup.tracking = TrackingConfig {
        criteria: LinkCriteria {
            xt: 0.5,
            yt: 0.5,
            xpt: 0.02,
            ypt: 0.02,
        },
        max_tracks,
        ..Default::default()
    };
    DcTracker::from_setup(&setup).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: no track ever holds two space points from one chamber
    #[test]
    fn prop_one_point_per_chamber(sps in space_points_strategy(), max in 1..12usize) {
        let result = three_chamber_tracker(max).process_event(&sps);

        for track in &result.tracks {
            let chambers: HashSet<usize> =
                track.space_point_ids().iter().map(|&id| sps[id].chamber).collect();
            prop_assert_eq!(chambers.len(), track.num_space_points());
        }
    }

    /// Property: a track's hits are exactly its members' hits, in member order
    #[test]
    fn prop_hits_are_union_of_members(sps in space_points_strategy()) {
        let result = three_chamber_tracker(64).process_event(&sps);

        for track in &result.tracks {
            let expected: Vec<DcHit> = track
                .space_point_ids()
                .iter()
                .flat_map(|&id| sps[id].hits.iter().copied())
                .collect();
            prop_assert_eq!(track.hits(), expected.as_slice());
        }
    }

    /// Property: exceeding the bound is all-or-nothing
    #[test]
    fn prop_abort_leaves_no_tracks(sps in space_points_strategy(), max in 1..4usize) {
        let result = three_chamber_tracker(max).process_event(&sps);

        match result.status {
            LinkStatus::Aborted { max_tracks } => {
                prop_assert_eq!(max_tracks, max);
                prop_assert!(result.tracks.is_empty());
            }
            _ => prop_assert!(result.tracks.len() <= max),
        }
    }

    /// Property: the first pair in tolerance always ends up on one track
    #[test]
    fn prop_close_pair_links(
        stub in (-5.0..5.0f64, -5.0..5.0f64, -0.05..0.05f64, -0.05..0.05f64),
        delta in (-0.49..0.49f64, -0.49..0.49f64, -0.019..0.019f64, -0.019..0.019f64),
    ) {
        let a = Vector4::new(stub.0, stub.1, stub.2, stub.3);
        let b = a + Vector4::new(delta.0, delta.1, delta.2, delta.3);
        let sps = vec![
            SpacePoint::new(1, a, vec![DcHit::new(1, 0, 0.0)]),
            SpacePoint::new(2, b, vec![DcHit::new(7, 0, 0.0)]),
        ];

        let result = tracker(10).process_event(&sps);

        prop_assert_eq!(result.tracks.len(), 1);
        prop_assert_eq!(result.tracks[0].space_point_ids(), &[0, 1]);
    }

    /// Property: projection is pure and saturates on a vanishing denominator
    #[test]
    fn prop_dpsi_pure_and_saturating(
        ray in ray_strategy(),
        coeffs in prop::array::uniform9(-2.0..2.0f64),
        tiny in 0.0..1.0f64,
    ) {
        prop_assert_eq!(dpsi(&ray, &coeffs).to_bits(), dpsi(&ray, &coeffs).to_bits());

        let mut flat = coeffs;
        flat[6] = 0.0;
        flat[7] = 0.0;
        flat[8] = tiny * CINFINITY * 0.5;
        prop_assert_eq!(dpsi(&ray, &flat), INFINITY);
    }

    /// Property: noise-free hits fit back to their ray with chi2 ~ 0
    #[test]
    fn prop_exact_hits_fit_exactly(ray in ray_strategy()) {
        let tracker = tracker(10);
        let geometry = tracker.geometry();
        let hits = |chamber: usize| -> Vec<DcHit> {
            geometry
                .planes_in_chamber(chamber)
                .map(|p| DcHit::new(p, 0, geometry.plane(p).unwrap().project(&ray)))
                .collect()
        };
        let stub = Vector4::zeros();
        let sps = vec![
            SpacePoint::new(1, stub, hits(1)),
            SpacePoint::new(2, stub, hits(2)),
        ];

        let result = tracker.process_event(&sps);
        prop_assert_eq!(result.tracks.len(), 1);

        let track = &result.tracks[0];
        prop_assert!(track.is_fitted());
        prop_assert!(track.chi2() < 1e-6);
        assert_abs_diff_eq!(track.ray(), ray, epsilon = 1e-7);
    }

    /// Property: four hits on independent planes solve exactly
    #[test]
    fn prop_four_hits_solve_exactly(ray in ray_strategy()) {
        let tracker = tracker(10);
        let geometry = tracker.geometry();
        let hits: Vec<DcHit> = [1usize, 2, 11, 12]
            .iter()
            .map(|&p| DcHit::new(p, 0, geometry.plane(p).unwrap().project(&ray)))
            .collect();

        let solved = tracker.fitter().solve_ray(&hits).unwrap();
        for hit in &hits {
            let residual = hit.coord - geometry.plane(hit.plane).unwrap().project(&solved);
            prop_assert!(residual.abs() < 1e-7);
        }
    }

    /// Property: under-constrained tracks keep the sentinel and no ray
    #[test]
    fn prop_underconstrained_keeps_sentinel(n_hits in 2..=4usize) {
        let tracker = tracker(10);
        let ch1: Vec<DcHit> = (1..n_hits).map(|p| DcHit::new(p, 0, 0.0)).collect();
        let sps = vec![
            SpacePoint::new(1, Vector4::zeros(), ch1),
            SpacePoint::new(2, Vector4::zeros(), vec![DcHit::new(7, 0, 0.0)]),
        ];

        let result = tracker.process_event(&sps);
        let track = &result.tracks[0];
        prop_assert_eq!(track.num_hits(), n_hits);
        prop_assert_eq!(track.chi2(), CHI2_UNFIT);
        prop_assert!(track.fitted_ray().is_none());
    }
}
