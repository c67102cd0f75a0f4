//! The simulation engine.
//!
//! During a run the onion service picks and rotates guards while the
//! adversary keeps working toward a guard discovery attack. Time moves
//! forward in fixed ticks; every tick resolves rotations and then
//! compromises. The run ends when the adversary compromises an L1 guard (or
//! an L2 guard when stopping at guard discovery).

use crate::adversary::{Adversary, Verdict};
use crate::config::SimConfig;
use crate::context::SimContext;
use crate::error::SimError;
use crate::layer::StepContext;
use crate::state::{RunOutcome, SimulationState};
use crate::time::{as_hours, SimTime};
use crate::topology::Topology;
use tracing::{debug, info};

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing terminal happened
    Continue,

    /// The adversary won during this tick
    AdversaryWon(RunOutcome),
}

/// A single simulation run.
pub struct Engine {
    config: SimConfig,
    adversary: Adversary,

    /// Seeded randomness and guard names for this run
    ctx: SimContext,

    state: SimulationState,
    topology: Topology,

    /// Set once the adversary has won
    outcome: Option<RunOutcome>,
}

impl Engine {
    /// Validates `config` and picks the initial guards.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let adversary = Adversary::new(config.sybil, config.pwnage, config.stop_at_guard_discovery)?;
        let mut ctx = SimContext::new(config.seed);
        let state = SimulationState::new();

        let topology = {
            let mut step = StepContext {
                adversary: &adversary,
                policy: config.rotation,
                ctx: &mut ctx,
                now: state.now(),
            };
            Topology::build(config.topology, &mut step)?
        };

        debug!(
            "Engine ready (seed={}, topology={}, {})",
            config.seed, config.topology, adversary
        );

        Ok(Self {
            config,
            adversary,
            ctx,
            state,
            topology,
            outcome: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn adversary(&self) -> &Adversary {
        &self.adversary
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Current simulated time in seconds.
    pub fn now(&self) -> SimTime {
        self.state.now()
    }

    pub fn ticks(&self) -> u64 {
        self.state.ticks()
    }

    /// Outcome of the run, once the adversary has won.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Moves simulated time forward by one tick and resolves what happened.
    ///
    /// Returns an error if called again after the adversary won.
    pub fn advance_tick(&mut self) -> Result<TickOutcome, SimError> {
        if self.outcome.is_some() {
            return Err(SimError::RunFinished(self.state.now()));
        }

        let now = self.state.advance(self.config.tick_secs)?;
        let mut step = StepContext {
            adversary: &self.adversary,
            policy: self.config.rotation,
            ctx: &mut self.ctx,
            now,
        };

        match self.topology.advance_tick(&mut step, &mut self.state)? {
            Verdict::Continue => Ok(TickOutcome::Continue),
            Verdict::AdversaryWon(winner) => {
                let outcome = self.state.outcome(self.config.seed, winner);
                info!(
                    "Adversary '{}' won after {} hours via {} (rotations: {})",
                    self.adversary,
                    as_hours(outcome.finished_at),
                    outcome.path_string(),
                    outcome.total_rotations
                );
                self.outcome = Some(outcome.clone());
                Ok(TickOutcome::AdversaryWon(outcome))
            }
        }
    }

    /// Runs until the adversary wins.
    ///
    /// There is no step limit: with a harmless adversary this never returns.
    /// Use [`Engine::run_for`] when a bound is needed.
    pub fn run(&mut self) -> Result<RunOutcome, SimError> {
        loop {
            if let TickOutcome::AdversaryWon(outcome) = self.advance_tick()? {
                return Ok(outcome);
            }
        }
    }

    /// Runs for at most `max_ticks` ticks.
    ///
    /// Returns `None` if the adversary has not won by then.
    pub fn run_for(&mut self, max_ticks: u64) -> Result<Option<RunOutcome>, SimError> {
        for _ in 0..max_ticks {
            if let TickOutcome::AdversaryWon(outcome) = self.advance_tick()? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }
}
