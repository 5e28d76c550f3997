//! Tracking scenarios for the simulation harness.

use crate::error::SimError;
use crate::oracle::OracleConfig;
use dctrack_core::TrackingConfig;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: One clean track per event
    SingleTrack,

    /// SIM-002: Several tracks per event, all must be found
    MultiTrack,

    /// SIM-003: Plane inefficiency plus noise space points
    Noisy,

    /// SIM-004: Single-stub mode, double residuals between chambers
    SingleStub,

    /// SIM-005: Candidate bound of one with two tracks per event
    Overflow,
}

/// Event content and tracking overrides for a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioProfile {
    /// Truth rays per event
    pub tracks_per_event: usize,

    pub oracle: OracleConfig,

    /// Forces single-stub mode when set
    pub single_stub: bool,

    /// Overrides the configured candidate bound when set
    pub max_tracks: Option<usize>,
}

impl ScenarioProfile {
    /// Applies the scenario's overrides to a tracking configuration.
    pub fn apply(&self, tracking: &mut TrackingConfig) {
        tracking.single_stub = self.single_stub;
        if let Some(max) = self.max_tracks {
            tracking.max_tracks = max;
        }
    }
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleTrack,
            ScenarioId::MultiTrack,
            ScenarioId::Noisy,
            ScenarioId::SingleStub,
            ScenarioId::Overflow,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleTrack => "single_track",
            ScenarioId::MultiTrack => "multi_track",
            ScenarioId::Noisy => "noisy",
            ScenarioId::SingleStub => "single_stub",
            ScenarioId::Overflow => "overflow",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleTrack => "One track per event, verify efficiency, resolution and chi2",
            ScenarioId::MultiTrack => "Three tracks per event, verify every truth ray is found",
            ScenarioId::Noisy => "95% plane efficiency and two noise space points per event",
            ScenarioId::SingleStub => "Per-chamber tracks, verify double residuals are filled",
            ScenarioId::Overflow => "max_tracks = 1 with two tracks, verify all-or-nothing abort",
        }
    }

    /// Returns the event content and tracking overrides.
    pub fn profile(&self) -> ScenarioProfile {
        let base = ScenarioProfile {
            tracks_per_event: 1,
            oracle: OracleConfig::default(),
            single_stub: false,
            max_tracks: None,
        };

        match self {
            ScenarioId::SingleTrack => base,
            ScenarioId::MultiTrack => ScenarioProfile {
                tracks_per_event: 3,
                ..base
            },
            ScenarioId::Noisy => ScenarioProfile {
                oracle: OracleConfig {
                    plane_efficiency: 0.95,
                    noise_points: 2,
                    ..OracleConfig::default()
                },
                ..base
            },
            ScenarioId::SingleStub => ScenarioProfile {
                single_stub: true,
                ..base
            },
            ScenarioId::Overflow => ScenarioProfile {
                tracks_per_event: 2,
                max_tracks: Some(1),
                ..base
            },
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_track" | "singletrack" | "sim-001" => Ok(ScenarioId::SingleTrack),
            "multi_track" | "multitrack" | "sim-002" => Ok(ScenarioId::MultiTrack),
            "noisy" | "sim-003" => Ok(ScenarioId::Noisy),
            "single_stub" | "singlestub" | "sim-004" => Ok(ScenarioId::SingleStub),
            "overflow" | "sim-005" => Ok(ScenarioId::Overflow),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("SIM-005".parse::<ScenarioId>().unwrap(), ScenarioId::Overflow);
        assert!(matches!(
            "no_such_scenario".parse::<ScenarioId>(),
            Err(SimError::UnknownScenario(_))
        ));
    }

    #[test]
    fn test_profile_overrides_tracking() {
        let mut tracking = TrackingConfig::default();
        ScenarioId::Overflow.profile().apply(&mut tracking);
        assert_eq!(tracking.max_tracks, 1);
        assert!(!tracking.single_stub);

        let mut tracking = TrackingConfig::default();
        ScenarioId::SingleStub.profile().apply(&mut tracking);
        assert!(tracking.single_stub);
        assert_eq!(tracking.max_tracks, 10);
    }
}
