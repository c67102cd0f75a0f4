//! Guards: the nodes protecting the onion service.
//!
//! Each guard is picked by its layer, sticks around until its rotation
//! deadline, and may get compromised along the way. When a guard is picked we
//! roll whether it is a Sybil. If the adversary can see it (it is in L3, or
//! an adjacent outer guard is compromised) she also starts a pwnage timer
//! against it.

use crate::adversary::PwnageDeadline;
use crate::error::SimError;
use crate::layer::{LayerId, StepContext};
use crate::time::SimTime;
use serde::Serialize;
use tracing::{debug, info};

/// Identity of a guard within one run (`node1`, `node2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct GuardId(u64);

impl GuardId {
    /// Creates a guard identity from its sequence number.
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }
}

impl std::fmt::Display for GuardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node{}", self.0)
    }
}

impl From<GuardId> for String {
    fn from(id: GuardId) -> Self {
        id.to_string()
    }
}

/// Whether, and through whom, the adversary can see a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    /// Outside the adversary's line of sight
    NotExposed,

    /// Visible because it sits in the outermost layer
    OuterBoundary,

    /// Visible because this compromised outer guard talks to it
    ExposedBy(GuardId),
}

impl Exposure {
    pub fn is_exposed(&self) -> bool {
        !matches!(self, Exposure::NotExposed)
    }
}

/// Compromise state of a guard. Ordered so that it can only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompromiseState {
    Uncompromised,
    Sybiled,
    Pwned,
}

/// A single guard in a guard layer.
#[derive(Debug, Clone)]
pub struct Guard {
    id: GuardId,
    layer: LayerId,

    /// Absolute time at which this guard gets rotated out
    rotation_deadline: SimTime,

    /// Rolled once when the guard was picked
    is_sybiled: bool,

    /// Sampled once, when the guard first becomes visible
    pwnage_deadline: Option<PwnageDeadline>,

    targeted_by: Exposure,

    state: CompromiseState,
}

impl Guard {
    /// Picks a new guard for `layer`.
    ///
    /// `exposure` is the guard's visibility at creation time, as determined
    /// by its layer from the adjacent outer layer.
    ///
    /// Fails if the rotation deadline does not fit in simulated time.
    pub fn spawn(
        layer: LayerId,
        exposure: Exposure,
        step: &mut StepContext<'_>,
    ) -> Result<Self, SimError> {
        let id = step.ctx.next_guard_id();
        let now = step.now;

        let is_sybiled = step.adversary.try_sybil(layer, step.ctx.rng());
        if is_sybiled {
            info!("[*] {} ({}) got SYBILed!", id, layer);
        }

        let rotation_delay = step.policy.sample_delay(layer, step.ctx.rng());
        let rotation_deadline = now.checked_add(rotation_delay).ok_or_else(|| {
            SimError::invariant(format!("rotation deadline of {} overflows simulated time", id))
        })?;
        debug!("New guard {} ({}) will rotate in {} seconds", id, layer, rotation_delay);

        let pwnage_deadline = if exposure.is_exposed() {
            let deadline = step.adversary.sample_pwnage_deadline(now, step.ctx.rng());
            debug!("{} ({}) is targeted ({:?}), pwnage {:?}", id, layer, exposure, deadline);
            Some(deadline)
        } else {
            None
        };

        Ok(Self {
            id,
            layer,
            rotation_deadline,
            is_sybiled,
            pwnage_deadline,
            targeted_by: exposure,
            state: CompromiseState::Uncompromised,
        })
    }

    pub fn id(&self) -> GuardId {
        self.id
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn rotation_deadline(&self) -> SimTime {
        self.rotation_deadline
    }

    pub fn is_sybiled(&self) -> bool {
        self.is_sybiled
    }

    pub fn pwnage_deadline(&self) -> Option<PwnageDeadline> {
        self.pwnage_deadline
    }

    pub fn targeted_by(&self) -> Exposure {
        self.targeted_by
    }

    pub fn is_targeted(&self) -> bool {
        self.targeted_by.is_exposed()
    }

    pub fn compromise_state(&self) -> CompromiseState {
        self.state
    }

    pub fn is_compromised(&self) -> bool {
        self.state != CompromiseState::Uncompromised
    }

    /// Returns true if this guard is due for rotation.
    pub fn has_rotated(&self, now: SimTime) -> bool {
        now >= self.rotation_deadline
    }

    /// Returns true if the adversary's pwnage timer against this guard expired.
    pub fn is_pwned(&self, now: SimTime) -> bool {
        match self.pwnage_deadline {
            Some(PwnageDeadline::At(deadline)) => now >= deadline,
            Some(PwnageDeadline::Never) | None => false,
        }
    }

    /// Marks the guard as visible. Returns false if it already was.
    pub(crate) fn expose(&mut self, exposure: Exposure) -> bool {
        if self.is_targeted() || !exposure.is_exposed() {
            return false;
        }
        self.targeted_by = exposure;
        true
    }

    /// Stores the pwnage deadline. A guard's deadline is only ever sampled once.
    pub(crate) fn set_pwnage_deadline(&mut self, deadline: PwnageDeadline) -> Result<(), SimError> {
        if self.pwnage_deadline.is_some() {
            return Err(SimError::invariant(format!(
                "{} already has a pwnage deadline",
                self
            )));
        }
        self.pwnage_deadline = Some(deadline);
        Ok(())
    }

    /// Advances the compromise state for time `now`.
    ///
    /// Pwnage takes precedence over a pending Sybil flag. Returns the new
    /// state only when the guard just transitioned.
    pub(crate) fn check_compromise(&mut self, now: SimTime) -> Option<CompromiseState> {
        if self.is_compromised() {
            return None;
        }
        let next = if self.is_pwned(now) {
            info!("[*] {} got PWNed!", self);
            CompromiseState::Pwned
        } else if self.is_sybiled {
            CompromiseState::Sybiled
        } else {
            return None;
        };
        self.state = next;
        Some(next)
    }
}

impl std::fmt::Display for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adversary::{Adversary, PwnageModel, SybilModel};
    use crate::context::SimContext;
    use crate::rotation::RotationPolicy;
    use crate::time::{DAY, HOUR};

    fn spawn_with(
        adversary: &Adversary,
        layer: LayerId,
        exposure: Exposure,
        now: SimTime,
        ctx: &mut SimContext,
    ) -> Guard {
        let mut step = StepContext {
            adversary,
            policy: RotationPolicy::Uniform,
            ctx,
            now,
        };
        Guard::spawn(layer, exposure, &mut step).unwrap()
    }

    #[test]
    fn test_guard_rotation_deadline() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(42);
        let now = 5_000;

        let guard = spawn_with(&adversary, LayerId::L3, Exposure::OuterBoundary, now, &mut ctx);
        let deadline = guard.rotation_deadline();

        assert!(deadline >= now + 10 * HOUR && deadline <= now + 14 * HOUR);
        assert!(!guard.has_rotated(deadline - 1));
        assert!(guard.has_rotated(deadline));
        assert_eq!(guard.id().to_string(), "node1");
    }

    #[test]
    fn test_rotation_deadline_overflow_is_invariant_violation() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(42);
        let mut step = StepContext {
            adversary: &adversary,
            policy: RotationPolicy::Uniform,
            ctx: &mut ctx,
            now: u64::MAX - 10,
        };

        let result = Guard::spawn(LayerId::L3, Exposure::OuterBoundary, &mut step);
        assert!(matches!(result, Err(SimError::Invariant(_))));
    }

    #[test]
    fn test_unexposed_guard_has_no_pwnage() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::Apt, false).unwrap();
        let mut ctx = SimContext::new(42);

        let guard = spawn_with(&adversary, LayerId::L2, Exposure::NotExposed, 0, &mut ctx);

        assert!(!guard.is_targeted());
        assert_eq!(guard.pwnage_deadline(), None);
        assert!(!guard.is_pwned(365 * DAY));
    }

    #[test]
    fn test_exposed_guard_gets_pwned() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::Apt, false).unwrap();
        let mut ctx = SimContext::new(42);

        let mut guard = spawn_with(&adversary, LayerId::L3, Exposure::OuterBoundary, 0, &mut ctx);
        let Some(PwnageDeadline::At(deadline)) = guard.pwnage_deadline() else {
            panic!("APT pwnage always has a deadline");
        };

        assert_eq!(guard.check_compromise(deadline.saturating_sub(1)), None);
        assert_eq!(guard.check_compromise(deadline), Some(CompromiseState::Pwned));
        // Already compromised: no second transition
        assert_eq!(guard.check_compromise(deadline + 1), None);
        assert_eq!(guard.compromise_state(), CompromiseState::Pwned);
    }

    #[test]
    fn test_sybil_compromise_ignores_visibility() {
        let adversary = Adversary::new(SybilModel::Fixed(1.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(42);

        let mut guard = spawn_with(&adversary, LayerId::L1, Exposure::NotExposed, 0, &mut ctx);

        assert!(guard.is_sybiled());
        assert!(!guard.is_targeted());
        assert_eq!(guard.check_compromise(1000), Some(CompromiseState::Sybiled));
    }

    #[test]
    fn test_never_deadline() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(42);

        let mut guard = spawn_with(&adversary, LayerId::L3, Exposure::OuterBoundary, 0, &mut ctx);

        assert_eq!(guard.pwnage_deadline(), Some(PwnageDeadline::Never));
        assert!(!guard.is_pwned(u64::MAX));
        assert_eq!(guard.check_compromise(u64::MAX), None);
    }

    #[test]
    fn test_expose_only_once() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(42);
        let mut guard = spawn_with(&adversary, LayerId::L1, Exposure::NotExposed, 0, &mut ctx);

        assert!(guard.expose(Exposure::ExposedBy(GuardId::new(7))));
        assert!(!guard.expose(Exposure::ExposedBy(GuardId::new(8))));
        assert_eq!(guard.targeted_by(), Exposure::ExposedBy(GuardId::new(7)));
    }

    #[test]
    fn test_pwnage_deadline_sampled_once() {
        let adversary = Adversary::new(SybilModel::Fixed(0.0), PwnageModel::None, false).unwrap();
        let mut ctx = SimContext::new(42);
        let mut guard = spawn_with(&adversary, LayerId::L2, Exposure::NotExposed, 0, &mut ctx);

        assert!(guard.set_pwnage_deadline(PwnageDeadline::At(10)).is_ok());
        assert!(matches!(
            guard.set_pwnage_deadline(PwnageDeadline::Never),
            Err(SimError::Invariant(_))
        ));
    }
}
