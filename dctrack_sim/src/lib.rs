//! DcTrack Deterministic Simulation Harness
//!
//! Stands in for everything upstream of the tracking core: it generates
//! straight-line ground-truth rays, digitizes them into smeared plane hits
//! and reduces each chamber's hits to a space point. The tracking engine
//! then runs on those space points and its output is scored against the
//! truth.
//!
//! # Core Principle: One Seed
//!
//! All randomness comes from a single ChaCha8 stream derived from the run
//! seed, so a scenario replays bit-identically.
//!
//! # Usage
//!
//! ```ignore
//! use dctrack_sim::{ScenarioRunner, ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 500);
//! let result = runner.run(ScenarioId::SingleTrack);
//! assert!(result.passed);
//! ```

mod error;
mod exporter;
mod oracle;
mod runner;
pub mod scenarios;

pub use error::SimError;
pub use exporter::{EventFrame, RaySummary, SimExport, TrackSummary};
pub use oracle::{GeneratedEvent, Oracle, OracleConfig};
pub use runner::{json_summary, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::{ScenarioId, ScenarioProfile};
