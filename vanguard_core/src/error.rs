//! Error types for the simulation engine.

use thiserror::Error;

/// Errors raised while building a run from its configuration.
///
/// All of these fire before the first tick executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Topology string is not three `-` separated counts in `1..=9`
    #[error("Invalid topology '{0}': expected \"L1-L2-L3\" with counts between 1 and 9")]
    InvalidTopology(String),

    /// Unknown sybil strength name
    #[error("Unknown sybil strength: {0}")]
    UnknownSybilStrength(String),

    /// Unknown pwnage model name
    #[error("Unknown pwnage model: {0}")]
    UnknownPwnageModel(String),

    /// Unknown rotation policy name
    #[error("Unknown rotation policy: {0}")]
    UnknownRotationPolicy(String),

    /// Sybil probability outside `[0, 1]`
    #[error("Sybil probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    /// Tick size must advance time
    #[error("Tick size must be at least one second")]
    ZeroTickSize,
}

/// Errors that can occur while driving a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Rejected configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal state contradicts an engine invariant
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// The adversary already won; no further ticks are valid
    #[error("Run already finished at t={0}s")]
    RunFinished(u64),
}

impl SimError {
    /// Creates an invariant violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}
