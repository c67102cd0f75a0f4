//! Vanguard Experiment Driver
//!
//! Runs the `vanguard_core` engine many times over one configuration and
//! turns the outcomes into something a human (or a plotting script) can read.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  ExperimentRunner                    │
//! │   run 0 (seed)   run 1 (seed+1)   ...   run N-1      │
//! │   ┌────────┐     ┌────────┐             ┌────────┐   │
//! │   │ Engine │     │ Engine │             │ Engine │   │
//! │   └───┬────┘     └───┬────┘             └───┬────┘   │
//! │       └──────────────┼──────────────────────┘        │
//! │                      ▼                               │
//! │              ExperimentSummary                       │
//! └──────────────────────┬───────────────────────────────┘
//!            ┌───────────┴───────────┐
//!            ▼                       ▼
//!     render_report()        ExperimentExport
//!     (text histograms)      (JSON file/stdout)
//! ```
//!
//! # Usage
//!
//! ```
//! use vanguard_core::{PwnageModel, SimConfig, SybilModel};
//! use vanguard_sim::{render_report, ExperimentRunner};
//!
//! let config = SimConfig::default()
//!     .with_sybil(SybilModel::Fixed(1.0))
//!     .with_pwnage(PwnageModel::None);
//!
//! let experiment = ExperimentRunner::new(config, 5).run().unwrap();
//! assert_eq!(experiment.summary.won, 5);
//! println!("{}", render_report(&experiment));
//! ```

mod experiment;
mod exporter;
pub mod report;

pub use experiment::{Experiment, ExperimentRunner, ExperimentSummary, RunResult};
pub use exporter::{ExperimentExport, ExportError};
pub use report::{render_report, Histogram};
