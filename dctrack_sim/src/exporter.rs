//! JSON exporter for offline analysis.
//!
//! Exports per-event truth and fitted tracks so resolution and efficiency
//! studies can be redone outside the harness.

use crate::runner::ScenarioMetrics;
use dctrack_core::{DcTrack, EventResult, FitStatus, LinkStatus, Ray, StubDiagnostics};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Focal-plane ray parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaySummary {
    pub x: f64,
    pub y: f64,
    pub xp: f64,
    pub yp: f64,
}

impl RaySummary {
    pub fn new(ray: &Ray) -> Self {
        Self {
            x: ray[0],
            y: ray[1],
            xp: ray[2],
            yp: ray[3],
        }
    }
}

/// One candidate track as seen by downstream analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSummary {
    pub space_points: Vec<usize>,
    pub num_hits: usize,
    pub status: FitStatus,

    /// Present only for fitted tracks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ray: Option<RaySummary>,

    pub chi2: f64,
    pub nfree: i32,
}

impl TrackSummary {
    pub fn new(track: &DcTrack) -> Self {
        Self {
            space_points: track.space_point_ids().to_vec(),
            num_hits: track.num_hits(),
            status: track.status(),
            ray: track.fitted_ray().as_ref().map(RaySummary::new),
            chi2: track.chi2(),
            nfree: track.nfree(),
        }
    }
}

/// A single event of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: u64,
    pub status: LinkStatus,
    pub truth: Vec<RaySummary>,
    pub tracks: Vec<TrackSummary>,
    pub diagnostics: StubDiagnostics,
}

impl EventFrame {
    pub fn new(event: u64, truth: &[Ray], result: &EventResult) -> Self {
        Self {
            event,
            status: result.status,
            truth: truth.iter().map(RaySummary::new).collect(),
            tracks: result.tracks.iter().map(TrackSummary::new).collect(),
            diagnostics: result.diagnostics,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// All events
    pub events: Vec<EventFrame>,

    /// Final verdict
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ScenarioMetrics>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            events: Vec::new(),
            passed: false,
            metrics: None,
        }
    }

    pub fn add_event(&mut self, frame: EventFrame) {
        self.events.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, metrics: ScenarioMetrics) {
        self.passed = passed;
        self.metrics = Some(metrics);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
