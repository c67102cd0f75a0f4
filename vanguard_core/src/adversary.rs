//! Adversary models and the compromise oracle.
//!
//! The adversary is consulted whenever a guard is picked (was it a Sybil?),
//! whenever a guard enters her line of sight (how long until she pwns it?),
//! and whenever a guard falls (which guards does she see next?). The oracle
//! itself keeps no per-guard state; everything it decides is stored on the
//! guards.

use crate::context::SimRng;
use crate::error::{ConfigError, SimError};
use crate::guard::{Exposure, Guard, GuardId};
use crate::layer::{GuardLayer, LayerId};
use crate::state::SimulationState;
use crate::time::{SimTime, DAY};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Sybil attack strength.
///
/// Each profile carries a per-layer probability that a freshly picked guard
/// is run by the adversary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SybilModel {
    Tiny,
    Weak,
    #[default]
    Medium,
    Hard,
    Hell,

    /// Same probability on every layer. Used to calibrate experiments
    /// (0.0 disables Sybils, 1.0 makes every guard hostile).
    Fixed(f64),
}

impl SybilModel {
    /// Returns all named profiles, weakest first.
    pub fn all() -> Vec<SybilModel> {
        vec![
            SybilModel::Tiny,
            SybilModel::Weak,
            SybilModel::Medium,
            SybilModel::Hard,
            SybilModel::Hell,
        ]
    }

    /// Returns the profile name.
    pub fn name(&self) -> &'static str {
        match self {
            SybilModel::Tiny => "tiny",
            SybilModel::Weak => "weak",
            SybilModel::Medium => "medium",
            SybilModel::Hard => "hard",
            SybilModel::Hell => "hell",
            SybilModel::Fixed(_) => "fixed",
        }
    }

    /// Sybil probabilities for (L1, L2, L3).
    ///
    /// Every named profile uses the same value on all three layers. Inner
    /// layers are only harder to reach because they must be exposed first.
    pub fn probabilities(&self) -> [f64; 3] {
        match *self {
            SybilModel::Tiny => [0.01, 0.01, 0.01],
            SybilModel::Weak => [0.02, 0.02, 0.02],
            SybilModel::Medium => [0.05, 0.05, 0.05],
            SybilModel::Hard => [0.07, 0.07, 0.07],
            SybilModel::Hell => [0.10, 0.10, 0.10],
            SybilModel::Fixed(p) => [p, p, p],
        }
    }

    /// Sybil probability for a single layer.
    pub fn probability(&self, layer: LayerId) -> f64 {
        self.probabilities()[layer.index()]
    }

    /// Rejects probabilities outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.probabilities().iter().find(|p| !(0.0..=1.0).contains(*p)) {
            Some(p) => Err(ConfigError::InvalidProbability(*p)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for SybilModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SybilModel::Fixed(p) => write!(f, "fixed({:.2})", p),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl std::str::FromStr for SybilModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(SybilModel::Tiny),
            "weak" => Ok(SybilModel::Weak),
            "medium" => Ok(SybilModel::Medium),
            "hard" => Ok(SybilModel::Hard),
            "hell" => Ok(SybilModel::Hell),
            _ => Err(ConfigError::UnknownSybilStrength(s.to_string())),
        }
    }
}

/// Attack capability against guards the adversary can see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PwnageModel {
    /// Never pwns anything
    #[serde(rename = "none")]
    None,

    /// 50% chance to pwn within 15 days, never otherwise
    #[serde(rename = "basic")]
    Basic,

    /// 75% chance within 15 days, the rest between 15 and 30 days
    #[default]
    #[serde(rename = "APT")]
    Apt,

    /// 50% within 2 days (MLAT), 25% within 7 days (exploit), 25% never
    #[serde(rename = "FVEY")]
    Fvey,

    /// Thugs show up after 2 days, 50% success by day 14
    #[serde(rename = "rubberhose1")]
    Rubberhose1,

    /// Thugs show up after a week, 50% success by day 21
    #[serde(rename = "rubberhose2")]
    Rubberhose2,
}

impl PwnageModel {
    /// Returns all pwnage models.
    pub fn all() -> Vec<PwnageModel> {
        vec![
            PwnageModel::None,
            PwnageModel::Basic,
            PwnageModel::Apt,
            PwnageModel::Fvey,
            PwnageModel::Rubberhose1,
            PwnageModel::Rubberhose2,
        ]
    }

    /// Returns the model name.
    pub fn name(&self) -> &'static str {
        match self {
            PwnageModel::None => "none",
            PwnageModel::Basic => "basic",
            PwnageModel::Apt => "APT",
            PwnageModel::Fvey => "FVEY",
            PwnageModel::Rubberhose1 => "rubberhose1",
            PwnageModel::Rubberhose2 => "rubberhose2",
        }
    }

    /// Samples how long the adversary needs to pwn a newly visible guard.
    ///
    /// Returns `None` when the guard will never fall to pwnage.
    pub fn sample_time_to_pwn(&self, rng: &mut SimRng) -> Option<SimTime> {
        let roll: f64 = rng.gen();
        let secs = match self {
            PwnageModel::None => return None,
            PwnageModel::Basic => {
                if roll > 0.5 {
                    return None;
                }
                // roll is uniform in [0, 0.5]: stretch it over 15 days
                15.0 * DAY as f64 * 2.0 * roll
            }
            PwnageModel::Apt => {
                if roll < 0.75 {
                    uniform_secs(rng, 0, 15 * DAY)
                } else {
                    uniform_secs(rng, 15 * DAY, 30 * DAY)
                }
            }
            PwnageModel::Fvey => {
                if roll > 0.75 {
                    return None;
                }
                if roll < 0.5 {
                    uniform_secs(rng, 0, 2 * DAY)
                } else {
                    uniform_secs(rng, 0, 7 * DAY)
                }
            }
            PwnageModel::Rubberhose1 => {
                if roll > 0.5 {
                    return None;
                }
                (2 * DAY) as f64 + (12 * DAY) as f64 * 2.0 * roll
            }
            PwnageModel::Rubberhose2 => {
                if roll > 0.5 {
                    return None;
                }
                (7 * DAY) as f64 + (14 * DAY) as f64 * 2.0 * roll
            }
        };
        Some(secs as SimTime)
    }
}

impl std::fmt::Display for PwnageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PwnageModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(PwnageModel::None),
            "basic" => Ok(PwnageModel::Basic),
            "apt" => Ok(PwnageModel::Apt),
            "fvey" => Ok(PwnageModel::Fvey),
            "rubberhose1" => Ok(PwnageModel::Rubberhose1),
            "rubberhose2" => Ok(PwnageModel::Rubberhose2),
            _ => Err(ConfigError::UnknownPwnageModel(s.to_string())),
        }
    }
}

/// Uniform draw of a fresh value in `[min, max]` seconds.
fn uniform_secs(rng: &mut SimRng, min: SimTime, max: SimTime) -> f64 {
    let u: f64 = rng.gen();
    min as f64 + (max - min) as f64 * u
}

/// When a targeted guard will fall to pwnage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PwnageDeadline {
    /// Absolute simulated time of compromise
    At(SimTime),

    /// The adversary never manages to pwn this guard
    Never,
}

/// What the run should do after a compromise was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep simulating
    Continue,

    /// The adversary reached her goal through this guard
    AdversaryWon(GuardId),
}

/// The adversary oracle.
#[derive(Debug, Clone)]
pub struct Adversary {
    sybil: SybilModel,
    pwnage: PwnageModel,

    /// Win as soon as an L2 guard falls (guard discovery) instead of L1
    stop_at_guard_discovery: bool,
}

impl Adversary {
    /// Creates an adversary with the given attack profiles.
    pub fn new(
        sybil: SybilModel,
        pwnage: PwnageModel,
        stop_at_guard_discovery: bool,
    ) -> Result<Self, ConfigError> {
        sybil.validate()?;
        Ok(Self {
            sybil,
            pwnage,
            stop_at_guard_discovery,
        })
    }

    /// Rolls whether a freshly picked guard in `layer` is a Sybil.
    pub fn try_sybil(&self, layer: LayerId, rng: &mut SimRng) -> bool {
        let probability = self.sybil.probability(layer);
        if probability <= 0.0 {
            return false;
        }
        let roll: f64 = rng.gen();
        roll <= probability
    }

    /// Samples the absolute time at which a visible guard gets pwned.
    pub fn sample_pwnage_deadline(&self, now: SimTime, rng: &mut SimRng) -> PwnageDeadline {
        match self.pwnage.sample_time_to_pwn(rng) {
            Some(offset) => PwnageDeadline::At(now.saturating_add(offset)),
            None => PwnageDeadline::Never,
        }
    }

    /// Handles a guard that just became compromised.
    ///
    /// `inward` is the layer behind the compromised guard (`None` for L1).
    /// Every guard there enters the adversary's line of sight.
    pub fn on_compromise(
        &self,
        guard: &Guard,
        inward: Option<&mut GuardLayer>,
        rng: &mut SimRng,
        state: &mut SimulationState,
    ) -> Result<Verdict, SimError> {
        state.record_compromise(guard);

        match guard.layer() {
            LayerId::L1 => return Ok(Verdict::AdversaryWon(guard.id())),
            LayerId::L2 if self.stop_at_guard_discovery => {
                return Ok(Verdict::AdversaryWon(guard.id()))
            }
            LayerId::L2 | LayerId::L3 => {}
        }

        let inward = inward.ok_or_else(|| {
            SimError::invariant(format!("{} has no inward layer to expose", guard))
        })?;

        if guard.layer() == LayerId::L3 {
            state.record_time_left_before_rotation(inward);
        }

        let now = state.now();
        for target in inward.guards_mut() {
            if target.expose(Exposure::ExposedBy(guard.id())) {
                debug!("{} is now targeted through {}", target, guard);
            }
            if target.pwnage_deadline().is_none() {
                let deadline = self.sample_pwnage_deadline(now, rng);
                target.set_pwnage_deadline(deadline)?;
            }
        }

        info!(
            "{} compromised ({:?}), {} guards of {} in line of sight",
            guard,
            guard.compromise_state(),
            inward.len(),
            inward.id()
        );

        Ok(Verdict::Continue)
    }
}

impl std::fmt::Display for Adversary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sybil: {}, Pwnage: {}", self.sybil, self.pwnage)
    }
}
