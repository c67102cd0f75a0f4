//! Run configuration.

use crate::adversary::{PwnageModel, SybilModel};
use crate::error::ConfigError;
use crate::layer::LayerId;
use crate::rotation::RotationPolicy;
use crate::time::{as_hours, SimTime};
use crate::topology::TopologySpec;
use serde::Serialize;

/// How many seconds simulated time moves forward in every tick.
///
/// Larger ticks finish faster but give rougher timing statistics.
pub const DEFAULT_TICK_SECS: SimTime = 1000;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimConfig {
    /// Guards per layer
    pub topology: TopologySpec,

    /// Sybil attack strength
    pub sybil: SybilModel,

    /// Pwnage attack capability
    pub pwnage: PwnageModel,

    /// Guard lifetime sampling
    pub rotation: RotationPolicy,

    /// End the run when an L2 guard falls instead of an L1 guard
    pub stop_at_guard_discovery: bool,

    /// Master seed for determinism
    pub seed: u64,

    /// Simulated seconds per tick
    pub tick_secs: SimTime,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            topology: TopologySpec::default(),
            sybil: SybilModel::Medium,
            pwnage: PwnageModel::Apt,
            rotation: RotationPolicy::Uniform,
            stop_at_guard_discovery: false,
            seed: 42,
            tick_secs: DEFAULT_TICK_SECS,
        }
    }
}

impl SimConfig {
    /// Builds a configuration from its textual form.
    ///
    /// ```
    /// use vanguard_core::SimConfig;
    ///
    /// let config = SimConfig::parse("2-4-4", "medium", "APT", "uniform", false).unwrap();
    /// assert_eq!(config.topology.to_string(), "2-4-4");
    /// ```
    pub fn parse(
        topology: &str,
        sybil: &str,
        pwnage: &str,
        rotation: &str,
        stop_at_guard_discovery: bool,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            topology: topology.parse()?,
            sybil: sybil.parse()?,
            pwnage: pwnage.parse()?,
            rotation: rotation.parse()?,
            stop_at_guard_discovery,
            ..Default::default()
        })
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the tick size.
    pub fn with_tick_secs(mut self, secs: SimTime) -> Self {
        self.tick_secs = secs;
        self
    }

    /// Sets the sybil model.
    pub fn with_sybil(mut self, sybil: SybilModel) -> Self {
        self.sybil = sybil;
        self
    }

    /// Sets the pwnage model.
    pub fn with_pwnage(mut self, pwnage: PwnageModel) -> Self {
        self.pwnage = pwnage;
        self
    }

    /// Checks the configuration before any guard is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.topology.validate()?;
        self.sybil.validate()?;
        if self.tick_secs == 0 {
            return Err(ConfigError::ZeroTickSize);
        }
        Ok(())
    }

    /// Human readable parameter block for reports.
    pub fn describe(&self) -> String {
        let window = |layer: LayerId| {
            let (min, max) = self.rotation.window(layer);
            format!("({} hours - {} hours)", as_hours(min), as_hours(max))
        };

        let mut params = format!(
            "Guard lifetimes: {}, {}, {}\n",
            window(LayerId::L1),
            window(LayerId::L2),
            window(LayerId::L3)
        );
        params += &format!(
            "Guard lifetime sampling logic: uniform, {}, {}\n",
            self.rotation, self.rotation
        );
        params += &format!("Topology type: {}\n", self.topology);
        params += &format!("Adversary type: Sybil: {}, Pwnage: {}\n", self.sybil, self.pwnage);
        if self.stop_at_guard_discovery {
            params += "Adversary stops at guard discovery\n";
        }
        params
    }
}
