//! JSON exporter for experiment results.
//!
//! Writes the configuration, the aggregate summary and every run outcome so
//! results can be plotted or diffed outside the simulator.

use crate::experiment::{Experiment, ExperimentSummary, RunResult};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use vanguard_core::SimConfig;

/// Errors raised while exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Complete experiment export.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentExport<'a> {
    /// Shared configuration (seed is the base seed)
    pub config: &'a SimConfig,

    /// Wall-clock time in seconds
    pub elapsed_secs: f64,

    pub summary: &'a ExperimentSummary,

    pub runs: &'a [RunResult],
}

impl<'a> ExperimentExport<'a> {
    pub fn new(experiment: &'a Experiment) -> Self {
        Self {
            config: &experiment.config,
            elapsed_secs: experiment.elapsed.as_secs_f64(),
            summary: &experiment.summary,
            runs: &experiment.results,
        }
    }

    /// Pretty JSON representation.
    pub fn to_json_string(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let json = self.to_json_string()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
