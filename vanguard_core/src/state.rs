//! Simulated time and per-run statistics.

use crate::error::SimError;
use crate::guard::{CompromiseState, Exposure, Guard, GuardId};
use crate::layer::{GuardLayer, LayerId};
use crate::time::SimTime;
use serde::Serialize;

/// A guard compromise as seen by the statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompromiseRecord {
    pub guard: GuardId,
    pub layer: LayerId,
    pub kind: CompromiseState,

    /// How the adversary got line of sight on this guard
    pub exposure: Exposure,

    /// Simulated time of the compromise
    pub at: SimTime,
}

/// Final record of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Seed the run was replayed from
    pub seed: u64,

    /// Ticks executed
    pub ticks: u64,

    /// Simulated time when the adversary won
    pub finished_at: SimTime,

    /// Guard that ended the run
    pub winner: GuardId,

    pub total_rotations: u64,

    /// First compromise time per layer, in seconds
    pub time_to_g1: Option<SimTime>,
    pub time_to_g2: Option<SimTime>,
    pub time_to_g3: Option<SimTime>,

    /// Remaining L2 lifetimes recorded at every L3 compromise
    pub g2_time_left_samples: Vec<SimTime>,

    pub pwned: Vec<GuardId>,
    pub sybiled: Vec<GuardId>,

    /// Compromised guards from the outermost exposed ancestor to the winner
    pub compromise_path: Vec<GuardId>,
}

impl RunOutcome {
    /// Renders the path as `node3 -> node7 -> node12`.
    pub fn path_string(&self) -> String {
        self.compromise_path
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Simulated clock plus everything we keep track of during a run.
///
/// Counters only grow and first-discovery times are write-once.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    /// Current simulated time
    now: SimTime,

    ticks: u64,

    total_rotations: u64,

    /// First compromise time per layer (L1, L2, L3)
    first_discovery: [Option<SimTime>; 3],

    g2_time_left: Vec<SimTime>,

    compromises: Vec<CompromiseRecord>,
}

impl SimulationState {
    /// Creates a state at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn total_rotations(&self) -> u64 {
        self.total_rotations
    }

    /// Time at which the first guard of `layer` fell.
    pub fn first_discovery(&self, layer: LayerId) -> Option<SimTime> {
        self.first_discovery[layer.index()]
    }

    pub fn g2_time_left(&self) -> &[SimTime] {
        &self.g2_time_left
    }

    /// All compromises in the order they happened.
    pub fn compromises(&self) -> &[CompromiseRecord] {
        &self.compromises
    }

    /// Moves simulated time forward by one tick.
    pub fn advance(&mut self, tick_secs: SimTime) -> Result<SimTime, SimError> {
        self.now = self
            .now
            .checked_add(tick_secs)
            .ok_or_else(|| SimError::invariant("simulated time overflowed"))?;
        self.ticks += 1;
        Ok(self.now)
    }

    pub fn record_rotation(&mut self) {
        self.total_rotations += 1;
    }

    /// Records a guard that just got compromised.
    pub fn record_compromise(&mut self, guard: &Guard) {
        let slot = &mut self.first_discovery[guard.layer().index()];
        if slot.is_none() {
            *slot = Some(self.now);
        }

        self.compromises.push(CompromiseRecord {
            guard: guard.id(),
            layer: guard.layer(),
            kind: guard.compromise_state(),
            exposure: guard.targeted_by(),
            at: self.now,
        });
    }

    /// An L3 guard just fell: note how long every L2 guard has left.
    pub fn record_time_left_before_rotation(&mut self, l2: &GuardLayer) {
        let now = self.now;
        self.g2_time_left.extend(
            l2.guards()
                .iter()
                .map(|g| g.rotation_deadline().saturating_sub(now)),
        );
    }

    fn record_for(&self, id: GuardId) -> Option<&CompromiseRecord> {
        self.compromises.iter().find(|r| r.guard == id)
    }

    /// Walks back from `target` through the guards that exposed it.
    ///
    /// Returns guards ordered from the outermost compromised ancestor down to
    /// `target`. A guard that was compromised without being exposed (a Sybil
    /// out of line of sight) starts its own path.
    pub fn compromise_path(&self, target: GuardId) -> Vec<GuardId> {
        let mut path = Vec::new();
        let mut cursor = self.record_for(target);

        while let Some(record) = cursor {
            path.push(record.guard);
            cursor = match record.exposure {
                Exposure::ExposedBy(parent) => self.record_for(parent),
                Exposure::OuterBoundary | Exposure::NotExposed => None,
            };
        }

        path.reverse();
        path
    }

    fn guards_by_kind(&self, kind: CompromiseState) -> Vec<GuardId> {
        self.compromises
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.guard)
            .collect()
    }

    /// Builds the outcome record for a run won through `winner`.
    pub fn outcome(&self, seed: u64, winner: GuardId) -> RunOutcome {
        RunOutcome {
            seed,
            ticks: self.ticks,
            finished_at: self.now,
            winner,
            total_rotations: self.total_rotations,
            time_to_g1: self.first_discovery(LayerId::L1),
            time_to_g2: self.first_discovery(LayerId::L2),
            time_to_g3: self.first_discovery(LayerId::L3),
            g2_time_left_samples: self.g2_time_left.clone(),
            pwned: self.guards_by_kind(CompromiseState::Pwned),
            sybiled: self.guards_by_kind(CompromiseState::Sybiled),
            compromise_path: self.compromise_path(winner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: u64, layer: LayerId, exposure: Exposure, at: SimTime) -> CompromiseRecord {
        CompromiseRecord {
            guard: GuardId::new(seq),
            layer,
            kind: CompromiseState::Sybiled,
            exposure,
            at,
        }
    }

    #[test]
    fn test_time_advances_monotonically() {
        let mut state = SimulationState::new();
        assert_eq!(state.now(), 0);

        state.advance(1000).unwrap();
        state.advance(1000).unwrap();

        assert_eq!(state.now(), 2000);
        assert_eq!(state.ticks(), 2);
    }

    #[test]
    fn test_time_overflow_is_invariant_violation() {
        let mut state = SimulationState::new();
        state.advance(u64::MAX).unwrap();
        assert!(matches!(state.advance(1), Err(SimError::Invariant(_))));
    }

    #[test]
    fn test_huge_tick_stops_run_with_invariant_violation() {
        let config = crate::config::SimConfig::default().with_tick_secs(u64::MAX - 10);
        let mut engine = crate::engine::Engine::new(config).unwrap();

        // Every guard expires on the first tick and its replacement cannot be scheduled
        assert!(matches!(engine.advance_tick(), Err(SimError::Invariant(_))));
    }

    #[test]
    fn test_compromise_path_walks_exposures() {
        let mut state = SimulationState::new();
        state.compromises = vec![
            record(1, LayerId::L3, Exposure::OuterBoundary, 1000),
            record(5, LayerId::L2, Exposure::ExposedBy(GuardId::new(1)), 2000),
            record(9, LayerId::L1, Exposure::ExposedBy(GuardId::new(5)), 3000),
        ];

        let path = state.compromise_path(GuardId::new(9));
        assert_eq!(path, vec![GuardId::new(1), GuardId::new(5), GuardId::new(9)]);
    }

    #[test]
    fn test_unexposed_sybil_path_is_single_guard() {
        let mut state = SimulationState::new();
        state.compromises = vec![record(4, LayerId::L1, Exposure::NotExposed, 1000)];

        assert_eq!(state.compromise_path(GuardId::new(4)), vec![GuardId::new(4)]);
    }

    #[test]
    fn test_outcome_path_string() {
        let mut state = SimulationState::new();
        state.compromises = vec![
            record(2, LayerId::L3, Exposure::OuterBoundary, 1000),
            record(3, LayerId::L2, Exposure::ExposedBy(GuardId::new(2)), 1000),
        ];

        let outcome = state.outcome(42, GuardId::new(3));
        assert_eq!(outcome.path_string(), "node2 -> node3");
        assert_eq!(outcome.sybiled.len(), 2);
        assert!(outcome.pwned.is_empty());
    }
}
