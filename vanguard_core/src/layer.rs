//! Guard layers.
//!
//! A guard layer is a fixed-size set of guards with their own rotation
//! times. It owns the per-tick rotation and compromise sweeps for its guards.

use crate::adversary::{Adversary, Verdict};
use crate::context::SimContext;
use crate::error::SimError;
use crate::guard::{Exposure, Guard, GuardId};
use crate::rotation::RotationPolicy;
use crate::state::SimulationState;
use crate::time::SimTime;
use serde::Serialize;
use tracing::{debug, info};

/// Position of a layer in the guard chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LayerId {
    /// Innermost layer, right next to the onion service
    L1,
    L2,
    /// Outermost layer, visible to the adversary by definition
    L3,
}

impl LayerId {
    /// All layers from the outside in.
    pub const OUTER_FIRST: [LayerId; 3] = [LayerId::L3, LayerId::L2, LayerId::L1];

    /// Returns the layer number (1 = innermost).
    pub fn number(self) -> u8 {
        match self {
            LayerId::L1 => 1,
            LayerId::L2 => 2,
            LayerId::L3 => 3,
        }
    }

    /// Looks up a layer by number.
    pub fn from_number(num: u8) -> Result<Self, SimError> {
        match num {
            1 => Ok(LayerId::L1),
            2 => Ok(LayerId::L2),
            3 => Ok(LayerId::L3),
            _ => Err(SimError::invariant(format!("unknown guard layer {}", num))),
        }
    }

    /// The adjacent layer further from the service (L1 -> L2 -> L3).
    pub fn outward(self) -> Option<LayerId> {
        match self {
            LayerId::L1 => Some(LayerId::L2),
            LayerId::L2 => Some(LayerId::L3),
            LayerId::L3 => None,
        }
    }

    /// The adjacent layer closer to the service (L3 -> L2 -> L1).
    pub fn inward(self) -> Option<LayerId> {
        match self {
            LayerId::L1 => None,
            LayerId::L2 => Some(LayerId::L1),
            LayerId::L3 => Some(LayerId::L2),
        }
    }

    pub(crate) fn index(self) -> usize {
        self.number() as usize - 1
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.number())
    }
}

/// Everything needed to pick guards and resolve compromises during a tick.
pub struct StepContext<'a> {
    pub adversary: &'a Adversary,
    pub policy: RotationPolicy,
    pub ctx: &'a mut SimContext,

    /// Current simulated time
    pub now: SimTime,
}

/// An ordered set of guards occupying one layer.
#[derive(Debug, Clone)]
pub struct GuardLayer {
    id: LayerId,

    /// Number of guards this layer always holds
    size: usize,

    /// Active guards in creation order
    guards: Vec<Guard>,
}

impl GuardLayer {
    /// Creates an empty layer that will hold `size` guards.
    pub fn new(id: LayerId, size: usize) -> Self {
        Self {
            id,
            size,
            guards: Vec::with_capacity(size),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Configured layer size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of active guards.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub(crate) fn guards_mut(&mut self) -> &mut [Guard] {
        &mut self.guards
    }

    /// First compromised guard, in creation order.
    pub fn first_compromised(&self) -> Option<&Guard> {
        self.guards.iter().find(|g| g.is_compromised())
    }

    /// Visibility of a guard picked right now for this layer.
    ///
    /// `outward` must be the adjacent outer layer (`None` only for L3).
    pub fn exposure_for_new_guard(&self, outward: Option<&GuardLayer>) -> Result<Exposure, SimError> {
        match (self.id, outward) {
            (LayerId::L3, _) => Ok(Exposure::OuterBoundary),
            (_, Some(outer)) => Ok(outer
                .first_compromised()
                .map(|g| Exposure::ExposedBy(g.id()))
                .unwrap_or(Exposure::NotExposed)),
            (id, None) => Err(SimError::invariant(format!(
                "{} has no outer layer to check line of sight against",
                id
            ))),
        }
    }

    fn add_new_guard(
        &mut self,
        step: &mut StepContext<'_>,
        outward: Option<&GuardLayer>,
    ) -> Result<GuardId, SimError> {
        let exposure = self.exposure_for_new_guard(outward)?;
        let guard = Guard::spawn(self.id, exposure, step)?;
        let id = guard.id();
        self.guards.push(guard);
        Ok(id)
    }

    /// Fills the layer with freshly picked guards.
    pub fn initialize(
        &mut self,
        step: &mut StepContext<'_>,
        outward: Option<&GuardLayer>,
    ) -> Result<(), SimError> {
        while self.guards.len() < self.size {
            self.add_new_guard(step, outward)?;
        }
        self.log_layer();
        Ok(())
    }

    /// Replaces every guard whose rotation deadline has passed.
    ///
    /// Eligibility is decided for the whole layer before any replacement is
    /// picked. Returns the number of rotations.
    pub fn sweep_rotations(
        &mut self,
        step: &mut StepContext<'_>,
        outward: Option<&GuardLayer>,
        state: &mut SimulationState,
    ) -> Result<usize, SimError> {
        let now = step.now;
        let (expired, kept): (Vec<Guard>, Vec<Guard>) =
            self.guards.drain(..).partition(|g| g.has_rotated(now));
        self.guards = kept;

        for old in &expired {
            let new_id = self.add_new_guard(step, outward)?;
            state.record_rotation();
            info!("{}: Rotated {} and replaced with {}", self.id, old.id(), new_id);
        }

        if !expired.is_empty() {
            self.log_layer();
        }

        if self.guards.len() != self.size {
            return Err(SimError::invariant(format!(
                "{} holds {} guards, expected {}",
                self.id,
                self.guards.len(),
                self.size
            )));
        }

        Ok(expired.len())
    }

    /// Detects guards that became compromised at time `now`.
    ///
    /// `on_compromise` is called once per transition and may end the sweep
    /// early by returning a winning verdict.
    pub fn sweep_compromises<F>(&mut self, now: SimTime, mut on_compromise: F) -> Result<Verdict, SimError>
    where
        F: FnMut(&Guard) -> Result<Verdict, SimError>,
    {
        for guard in self.guards.iter_mut() {
            if guard.check_compromise(now).is_none() {
                continue;
            }
            if let Verdict::AdversaryWon(winner) = on_compromise(&*guard)? {
                return Ok(Verdict::AdversaryWon(winner));
            }
        }
        Ok(Verdict::Continue)
    }

    fn log_layer(&self) {
        let names: Vec<String> = self.guards.iter().map(|g| g.id().to_string()).collect();
        debug!("{} topology: {:?}", self.id, names);
    }
}
