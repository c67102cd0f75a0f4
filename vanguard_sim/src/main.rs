//! Vanguard Simulator CLI
//!
//! Run guard discovery experiments against a chosen topology and adversary.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vanguard_core::{PwnageModel, SimConfig, SybilModel, DEFAULT_TICK_SECS};
use vanguard_sim::{render_report, ExperimentExport, ExperimentRunner};

/// Vanguard guard discovery simulator
#[derive(Parser, Debug)]
#[command(name = "vanguard-sim")]
#[command(about = "Simulate how fast an adversary walks the guard layers of an onion service", long_about = None)]
struct Args {
    /// Guards per layer as L1-L2-L3 (each 1..=9)
    #[arg(default_value = "2-4-4")]
    topology: String,

    /// Sybil strength (tiny, weak, medium, hard, hell)
    #[arg(default_value = "medium")]
    sybil: String,

    /// Pwnage model (none, basic, APT, FVEY, rubberhose1, rubberhose2)
    #[arg(default_value = "APT")]
    pwnage: String,

    /// Guard lifetime sampling for L2/L3 (uniform, maxx)
    #[arg(short, long, default_value = "uniform")]
    rotation: String,

    /// Stop when an L2 guard is compromised instead of an L1 guard
    #[arg(long)]
    stop_at_guard_discovery: bool,

    /// Number of simulation runs
    #[arg(short = 'n', long, default_value = "10")]
    runs: usize,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = DEFAULT_TICK_SECS)]
    tick_secs: u64,

    /// Give up on a run after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Verbose output (debug level unless RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    /// JSON output on stdout instead of the text report
    #[arg(long)]
    json: bool,

    /// Export the experiment to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn names<T: std::fmt::Display>(values: Vec<T>) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

/// Log filter from `RUST_LOG` directives, falling back to the `--verbose` level.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let rust_log = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(args.verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = SimConfig::parse(
        &args.topology,
        &args.sybil,
        &args.pwnage,
        &args.rotation,
        args.stop_at_guard_discovery,
    )
    .unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Topology: L1-L2-L3 with 1 to 9 guards per layer (e.g. 2-4-4)");
        eprintln!("Sybil strengths: {}", names(SybilModel::all()));
        eprintln!("Pwnage models: {}", names(PwnageModel::all()));
        eprintln!("Rotation policies: uniform, maxx");
        std::process::exit(1);
    });

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let config = config.with_seed(base_seed).with_tick_secs(args.tick_secs);
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if !args.json {
        info!("Vanguard Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let mut runner = ExperimentRunner::new(config, args.runs);
    if let Some(cap) = args.max_ticks {
        runner = runner.with_max_ticks(cap);
    }

    let experiment = match runner.run() {
        Ok(experiment) => experiment,
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    let export = ExperimentExport::new(&experiment);

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} runs to {}", experiment.results.len(), path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.json {
        match export.to_json_string() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize results: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!("{}", render_report(&experiment));
    }
}
