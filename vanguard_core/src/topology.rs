//! Guard topology of the onion service.
//!
//! A topology is three guard layers chained from the outside in:
//!
//! ```text
//!   adversary ──► L3 ──► L2 ──► L1 ──► onion service
//!              (outer)         (inner)
//! ```
//!
//! Guards in a layer only become visible to the adversary once a guard of the
//! adjacent outer layer is compromised. L3 is visible by definition.

use crate::adversary::Verdict;
use crate::error::{ConfigError, SimError};
use crate::layer::{GuardLayer, LayerId, StepContext};
use crate::state::SimulationState;
use serde::Serialize;

/// Largest number of guards allowed in a single layer.
pub const MAX_GUARDS_PER_LAYER: usize = 9;

/// Number of guards per layer, written `"L1-L2-L3"` (e.g. `"2-4-4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopologySpec {
    pub l1: usize,
    pub l2: usize,
    pub l3: usize,
}

impl TopologySpec {
    /// Creates a validated topology spec.
    pub fn new(l1: usize, l2: usize, l3: usize) -> Result<Self, ConfigError> {
        let spec = Self { l1, l2, l3 };
        spec.validate()?;
        Ok(spec)
    }

    /// Number of guards in `layer`.
    pub fn count(&self, layer: LayerId) -> usize {
        match layer {
            LayerId::L1 => self.l1,
            LayerId::L2 => self.l2,
            LayerId::L3 => self.l3,
        }
    }

    /// Checks that every layer holds between 1 and 9 guards.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = [self.l1, self.l2, self.l3]
            .iter()
            .all(|n| (1..=MAX_GUARDS_PER_LAYER).contains(n));
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidTopology(self.to_string()))
        }
    }
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self { l1: 2, l2: 4, l3: 4 }
    }
}

impl std::fmt::Display for TopologySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.l1, self.l2, self.l3)
    }
}

impl std::str::FromStr for TopologySpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTopology(s.to_string());

        let counts = s
            .trim()
            .split('-')
            .map(|part| part.trim().parse::<usize>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match counts.as_slice() {
            [l1, l2, l3] => Self::new(*l1, *l2, *l3).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// Three guard layers wired together.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Indexed by `LayerId::index()` (L1 first)
    layers: [GuardLayer; 3],
}

impl Topology {
    /// Builds the topology and picks its initial guards.
    ///
    /// Layers are filled from the outside in so that inner guards can check
    /// their line of sight against an already populated outer layer.
    pub fn build(spec: TopologySpec, step: &mut StepContext<'_>) -> Result<Self, SimError> {
        spec.validate()?;

        let mut topology = Self {
            layers: [
                GuardLayer::new(LayerId::L1, spec.l1),
                GuardLayer::new(LayerId::L2, spec.l2),
                GuardLayer::new(LayerId::L3, spec.l3),
            ],
        };

        for id in LayerId::OUTER_FIRST {
            let (layer, outward) = topology.split_outward(id);
            layer.initialize(step, outward)?;
        }

        Ok(topology)
    }

    pub fn layer(&self, id: LayerId) -> &GuardLayer {
        &self.layers[id.index()]
    }

    /// Given L1 return L2, given L2 return L3, given L3 return `None`.
    pub fn previous_layer(&self, id: LayerId) -> Option<&GuardLayer> {
        id.outward().map(|outer| self.layer(outer))
    }

    /// Given L3 return L2, given L2 return L1, given L1 return `None`.
    pub fn next_layer(&self, id: LayerId) -> Option<&GuardLayer> {
        id.inward().map(|inner| self.layer(inner))
    }

    /// Iterates layers from the outside in.
    pub fn layers_outer_first(&self) -> impl Iterator<Item = &GuardLayer> {
        LayerId::OUTER_FIRST.into_iter().map(move |id| self.layer(id))
    }

    /// Mutable access to `id` alongside its (read-only) outer neighbour.
    fn split_outward(&mut self, id: LayerId) -> (&mut GuardLayer, Option<&GuardLayer>) {
        let (lower, upper) = self.layers.split_at_mut(id.index() + 1);
        (&mut lower[id.index()], upper.first().map(|l| &*l))
    }

    /// Mutable access to `id` alongside its inner neighbour.
    fn split_inward(&mut self, id: LayerId) -> (&mut GuardLayer, Option<&mut GuardLayer>) {
        let (lower, upper) = self.layers.split_at_mut(id.index());
        (&mut upper[0], lower.last_mut())
    }

    /// Rotates expired guards in every layer, outer layer first.
    pub fn sweep_rotations(
        &mut self,
        step: &mut StepContext<'_>,
        state: &mut SimulationState,
    ) -> Result<usize, SimError> {
        let mut rotated = 0;
        for id in LayerId::OUTER_FIRST {
            let (layer, outward) = self.split_outward(id);
            rotated += layer.sweep_rotations(step, outward, state)?;
        }
        Ok(rotated)
    }

    /// Resolves new compromises, outer layer first.
    ///
    /// An L3 compromise found in this sweep exposes L2 before L2 is checked,
    /// so a whole chain can fall within a single tick.
    pub fn sweep_compromises(
        &mut self,
        step: &mut StepContext<'_>,
        state: &mut SimulationState,
    ) -> Result<Verdict, SimError> {
        let now = step.now;
        let adversary = step.adversary;
        let rng = step.ctx.rng();

        for id in LayerId::OUTER_FIRST {
            let (layer, mut inward) = self.split_inward(id);
            let verdict = layer.sweep_compromises(now, |guard| {
                adversary.on_compromise(guard, inward.as_deref_mut(), rng, state)
            })?;
            if let Verdict::AdversaryWon(_) = verdict {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Continue)
    }

    /// Runs one tick worth of topology updates: rotations, then compromises.
    pub fn advance_tick(
        &mut self,
        step: &mut StepContext<'_>,
        state: &mut SimulationState,
    ) -> Result<Verdict, SimError> {
        self.sweep_rotations(step, state)?;
        self.sweep_compromises(step, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adversary::{Adversary, PwnageModel, SybilModel};
    use crate::context::SimContext;
    use crate::guard::Exposure;
    use crate::rotation::RotationPolicy;

    fn build(spec: &str, adversary: &Adversary, ctx: &mut SimContext) -> Topology {
        let mut step = StepContext {
            adversary,
            policy: RotationPolicy::Uniform,
            ctx,
            now: 0,
        };
        Topology::build(spec.parse().unwrap(), &mut step).unwrap()
    }

    #[test]
    fn test_topology_parse() {
        let spec: TopologySpec = "1-2-4".parse().unwrap();
        assert_eq!(spec, TopologySpec { l1: 1, l2: 2, l3: 4 });
        assert_eq!(spec.to_string(), "1-2-4");
        assert_eq!(spec.count(LayerId::L3), 4);
    }

    #[test]
    fn test_topology_parse_rejects_garbage() {
        for bad in ["", "2-4", "2-4-4-4", "0-1-1", "1-10-1", "a-b-c", "2--4"] {
            assert_eq!(
                bad.parse::<TopologySpec>(),
                Err(ConfigError::InvalidTopology(bad.to_string())),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_build_fills_layers() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::Apt, false).unwrap();
        let mut ctx = SimContext::new(3);
        let topology = build("2-4-4", &adversary, &mut ctx);

        assert_eq!(topology.layer(LayerId::L1).len(), 2);
        assert_eq!(topology.layer(LayerId::L2).len(), 4);
        assert_eq!(topology.layer(LayerId::L3).len(), 4);

        // L3 guards are created first
        assert_eq!(topology.layer(LayerId::L3).guards()[0].id().to_string(), "node1");
        assert_eq!(topology.layer(LayerId::L1).guards()[1].id().to_string(), "node10");
    }

    #[test]
    fn test_initial_exposure() {
        let adversary = Adversary::new(SybilModel::Fixed(1.0), PwnageModel::Apt, false).unwrap();
        let mut ctx = SimContext::new(3);
        let topology = build("2-2-2", &adversary, &mut ctx);

        for guard in topology.layer(LayerId::L3).guards() {
            assert_eq!(guard.targeted_by(), Exposure::OuterBoundary);
            assert!(guard.pwnage_deadline().is_some());
        }
        // Nothing is compromised before the first sweep, even when every guard is a Sybil
        for id in [LayerId::L2, LayerId::L1] {
            for guard in topology.layer(id).guards() {
                assert_eq!(guard.targeted_by(), Exposure::NotExposed);
                assert_eq!(guard.pwnage_deadline(), None);
            }
        }
    }

    #[test]
    fn test_neighbour_lookups() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(3);
        let topology = build("1-2-3", &adversary, &mut ctx);

        assert_eq!(topology.previous_layer(LayerId::L1).map(|l| l.id()), Some(LayerId::L2));
        assert_eq!(topology.previous_layer(LayerId::L2).map(|l| l.id()), Some(LayerId::L3));
        assert!(topology.previous_layer(LayerId::L3).is_none());
        assert_eq!(topology.next_layer(LayerId::L3).map(|l| l.id()), Some(LayerId::L2));
        assert!(topology.next_layer(LayerId::L1).is_none());

        let order: Vec<LayerId> = topology.layers_outer_first().map(|l| l.id()).collect();
        assert_eq!(order, vec![LayerId::L3, LayerId::L2, LayerId::L1]);
    }

    #[test]
    fn test_chain_falls_within_one_tick() {
        let adversary = Adversary::new(SybilModel::Fixed(1.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(3);
        let mut topology = build("1-1-1", &adversary, &mut ctx);
        let mut state = SimulationState::new();
        state.advance(1000).unwrap();

        let mut step = StepContext {
            adversary: &adversary,
            policy: RotationPolicy::Uniform,
            ctx: &mut ctx,
            now: state.now(),
        };
        let verdict = topology.advance_tick(&mut step, &mut state).unwrap();

        let l1 = topology.layer(LayerId::L1).guards()[0].id();
        assert_eq!(verdict, Verdict::AdversaryWon(l1));
        assert_eq!(state.compromise_path(l1).len(), 3);
    }
}
