//! Experiment runner - repeats simulation runs and aggregates their outcomes.
//!
//! An experiment is a batch of independent runs sharing one configuration.
//! Every run gets its own engine, RNG and guard names; run `i` is seeded with
//! `base_seed + i` so any single run can be replayed on its own.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vanguard_core::time::{as_hours, HOUR};
use vanguard_core::{Engine, LayerId, RunOutcome, SimConfig, SimError, SimTime};

/// Result of a single run inside an experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    /// Index of the run within the experiment
    pub run: usize,

    /// Seed used
    pub seed: u64,

    /// Ticks executed
    pub total_ticks: u64,

    /// Simulated time when the run stopped
    pub final_time_secs: SimTime,

    /// Outcome if the adversary won, `None` if the tick cap was hit first
    pub outcome: Option<RunOutcome>,
}

impl RunResult {
    pub fn adversary_won(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Averages across the won runs of an experiment.
///
/// Layers the adversary never reached count as zero, so averages are taken
/// over every won run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentSummary {
    /// Total runs executed
    pub runs: usize,

    /// Runs where the adversary won
    pub won: usize,

    /// Runs stopped by the tick cap
    pub unfinished: usize,

    pub avg_guard_rotations: f64,
    pub avg_hours_to_g1: f64,
    pub avg_hours_to_g2: f64,
    pub avg_hours_to_g3: f64,

    /// Every L2 remaining-lifetime sample, in hours
    pub g2_time_left_hours: Vec<u64>,
}

impl ExperimentSummary {
    /// Aggregates a batch of run results.
    pub fn from_results(results: &[RunResult]) -> Self {
        let outcomes: Vec<&RunOutcome> = results.iter().filter_map(|r| r.outcome.as_ref()).collect();

        let mean = |values: Vec<f64>| -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let hours = |t: Option<SimTime>| t.unwrap_or(0) as f64 / HOUR as f64;

        Self {
            runs: results.len(),
            won: outcomes.len(),
            unfinished: results.len() - outcomes.len(),
            avg_guard_rotations: mean(outcomes.iter().map(|o| o.total_rotations as f64).collect()),
            avg_hours_to_g1: mean(outcomes.iter().map(|o| hours(o.time_to_g1)).collect()),
            avg_hours_to_g2: mean(outcomes.iter().map(|o| hours(o.time_to_g2)).collect()),
            avg_hours_to_g3: mean(outcomes.iter().map(|o| hours(o.time_to_g3)).collect()),
            g2_time_left_hours: outcomes
                .iter()
                .flat_map(|o| o.g2_time_left_samples.iter().map(|s| as_hours(*s)))
                .collect(),
        }
    }
}

/// A finished experiment.
#[derive(Debug, Clone, Serialize)]
pub struct Experiment {
    /// Configuration shared by every run (seed is the base seed)
    pub config: SimConfig,

    pub results: Vec<RunResult>,

    pub summary: ExperimentSummary,

    /// Wall-clock time spent simulating
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl Experiment {
    /// Whole hours to the given layer for every won run (0 when not reached).
    pub fn hours_to_layer(&self, layer: LayerId) -> Vec<u64> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref())
            .map(|o| {
                let t = match layer {
                    LayerId::L1 => o.time_to_g1,
                    LayerId::L2 => o.time_to_g2,
                    LayerId::L3 => o.time_to_g3,
                };
                as_hours(t.unwrap_or(0))
            })
            .collect()
    }
}

/// Runs experiments.
pub struct ExperimentRunner {
    /// Configuration for every run; its seed is the base seed
    config: SimConfig,

    /// Number of runs
    runs: usize,

    /// Safety cap on ticks per run (`None` = run until the adversary wins)
    max_ticks: Option<u64>,
}

impl ExperimentRunner {
    /// Creates a new experiment runner.
    pub fn new(config: SimConfig, runs: usize) -> Self {
        Self {
            config,
            runs,
            max_ticks: None,
        }
    }

    /// Caps the number of ticks per run.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Seed for run `index`.
    pub fn seed_for(&self, index: usize) -> u64 {
        self.config.seed.wrapping_add(index as u64)
    }

    /// Executes a single run.
    pub fn run_one(&self, index: usize) -> Result<RunResult, SimError> {
        let mut engine = Engine::new(self.config.clone().with_seed(self.seed_for(index)))?;
        let seed = engine.config().seed;

        match self.max_ticks {
            Some(cap) => {
                engine.run_for(cap)?;
            }
            None => {
                engine.run()?;
            }
        }

        match engine.outcome() {
            Some(o) => debug!(
                "Run {} (seed={}) won by '{}' in {} hours via {}",
                index,
                seed,
                engine.adversary(),
                as_hours(o.finished_at),
                o.path_string()
            ),
            None => warn!(
                "Run {} (seed={}) hit the tick cap at {} hours without a win",
                index,
                seed,
                as_hours(engine.now())
            ),
        }

        Ok(RunResult {
            run: index,
            seed,
            total_ticks: engine.ticks(),
            final_time_secs: engine.now(),
            outcome: engine.outcome().cloned(),
        })
    }

    /// Executes every run sequentially and aggregates the results.
    pub fn run(&self) -> Result<Experiment, SimError> {
        info!(
            "Starting experiment: {} runs of {} (base seed={})",
            self.runs, self.config.topology, self.config.seed
        );

        let started = Instant::now();
        let mut results = Vec::with_capacity(self.runs);
        for index in 0..self.runs {
            results.push(self.run_one(index)?);
            info!("Registered {} run", results.len());
        }

        let summary = ExperimentSummary::from_results(&results);
        Ok(Experiment {
            config: self.config.clone(),
            results,
            summary,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanguard_core::{PwnageModel, SybilModel};

    fn outcome(rotations: u64, g1: Option<SimTime>, g2: Option<SimTime>) -> RunOutcome {
        RunOutcome {
            seed: 0,
            ticks: 1,
            finished_at: g1.unwrap_or(0),
            winner: vanguard_core::GuardId::new(1),
            total_rotations: rotations,
            time_to_g1: g1,
            time_to_g2: g2,
            time_to_g3: None,
            g2_time_left_samples: vec![7200, 36_000],
            pwned: vec![],
            sybiled: vec![],
            compromise_path: vec![],
        }
    }

    fn result(run: usize, outcome: Option<RunOutcome>) -> RunResult {
        RunResult {
            run,
            seed: run as u64,
            total_ticks: 1,
            final_time_secs: 1000,
            outcome,
        }
    }

    #[test]
    fn test_summary_counts_missing_layers_as_zero() {
        let results = vec![
            result(0, Some(outcome(10, Some(7200), Some(3600)))),
            result(1, Some(outcome(20, Some(14_400), None))),
            result(2, None),
        ];

        let summary = ExperimentSummary::from_results(&results);

        assert_eq!(summary.runs, 3);
        assert_eq!(summary.won, 2);
        assert_eq!(summary.unfinished, 1);
        assert_eq!(summary.avg_guard_rotations, 15.0);
        assert_eq!(summary.avg_hours_to_g1, 3.0);
        assert_eq!(summary.avg_hours_to_g2, 0.5);
        assert_eq!(summary.avg_hours_to_g3, 0.0);
        assert_eq!(summary.g2_time_left_hours, vec![2, 10, 2, 10]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ExperimentSummary::from_results(&[]);
        assert_eq!(summary, ExperimentSummary::default());
    }

    #[test]
    fn test_runner_uses_consecutive_seeds() {
        let config = SimConfig::default().with_seed(100);
        let runner = ExperimentRunner::new(config, 3);

        assert_eq!(runner.seed_for(0), 100);
        assert_eq!(runner.seed_for(2), 102);
    }

    #[test]
    fn test_experiment_with_hostile_guards() {
        let config = SimConfig::default()
            .with_sybil(SybilModel::Fixed(1.0))
            .with_pwnage(PwnageModel::None);

        let experiment = ExperimentRunner::new(config, 4).run().unwrap();

        assert_eq!(experiment.results.len(), 4);
        assert_eq!(experiment.summary.won, 4);
        assert!(experiment.results.iter().all(|r| r.total_ticks == 1));
        assert_eq!(experiment.hours_to_layer(LayerId::L1), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_tick_cap_marks_unfinished() {
        let config = SimConfig::default()
            .with_sybil(SybilModel::Fixed(0.0))
            .with_pwnage(PwnageModel::None);

        let experiment = ExperimentRunner::new(config, 2).with_max_ticks(50).run().unwrap();

        assert_eq!(experiment.summary.unfinished, 2);
        assert!(experiment.results.iter().all(|r| !r.adversary_won()));
        assert!(experiment.results.iter().all(|r| r.final_time_secs == 50_000));
    }

    #[test]
    fn test_runs_are_reproducible() {
        let runner = ExperimentRunner::new(SimConfig::default(), 2).with_max_ticks(100_000);

        let first = runner.run_one(1).unwrap();
        let again = runner.run_one(1).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.seed, 43);
    }
}
