//! DcTrack Simulator CLI
//!
//! Run deterministic tracking scenarios against synthetic events.

use clap::Parser;
use dctrack_core::SetupConfig;
use dctrack_sim::{json_summary, ScenarioId, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// DcTrack deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "dctrack-sim")]
#[command(about = "Run deterministic tracking scenarios for DcTrack", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Events per scenario
    #[arg(short, long, default_value = "1000")]
    events: u64,

    /// Scenario to run (single_track, multi_track, noisy, single_stub, overflow, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Detector and tracking setup (JSON); the built-in two-chamber layout otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export per-event tracks to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging on stderr so stdout only carries the report
    let level = if args.json {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("DcTrack Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: single_track, multi_track, noisy, single_stub, overflow, all");
                std::process::exit(1);
            }
        }
    };

    let setup = match &args.config {
        Some(path) => match SetupConfig::from_file(path) {
            Ok(setup) => setup,
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => SetupConfig::default(),
    };

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed, args.events).with_setup(setup);

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let (result, export) = runner.run_with_export(scenarios[0]);
        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {}", e);
            std::process::exit(1);
        }
        info!("Exported {} events to {}", export.events.len(), export_path.display());

        report(&args, &[result]);
        return;
    }

    let results: Vec<ScenarioResult> = scenarios
        .iter()
        .map(|scenario| {
            if !args.json {
                info!("▶ {}: {}", scenario.name(), scenario.description());
            }
            runner.run(*scenario)
        })
        .collect();

    report(&args, &results);
}

/// Prints the summary and exits non-zero on any failure.
fn report(args: &Args, results: &[ScenarioResult]) {
    let total = results.len();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        // JSON output for CI parsing
        match serde_json::to_string_pretty(&json_summary(results)) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        for result in results {
            let m = &result.metrics;
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED | events={} eff={:.3} found={:.3} aborted={} chi2/ndf={:.2} rms={:.4}cm",
                    result.scenario.name(),
                    result.seed,
                    m.events,
                    m.tracking_efficiency(),
                    m.match_efficiency(),
                    m.aborted_events,
                    m.mean_reduced_chi2,
                    m.rms_position_error
                );
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
