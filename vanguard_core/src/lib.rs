//! Vanguard guard discovery simulator
//!
//! This crate models a guard discovery attack against an onion service
//! protected by three nested layers of guards. An adversary compromises
//! guards layer by layer, from the outermost layer inward, while the service
//! keeps rotating its guards. A run ends when the adversary compromises an
//! innermost (L1) guard.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Engine                           │
//! │  SimulationState (clock + stats)   SimContext (seed/RNG) │
//! │                                                          │
//! │  ┌──────────────── Topology ───────────────────┐         │
//! │  │  L3 guards ──► L2 guards ──► L1 guards      │         │
//! │  └─────────────────────────────────────────────┘         │
//! │            ▲ rotations        │ compromises              │
//! │            │                  ▼                          │
//! │  ┌────────────────────────────────────────────┐          │
//! │  │        Adversary (sybil + pwnage oracle)   │          │
//! │  └────────────────────────────────────────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All randomness is drawn from a single seeded ChaCha8 RNG owned by the run,
//! so a run is reproducible from its seed.
//!
//! # Usage
//!
//! ```
//! use vanguard_core::{Engine, SimConfig, SybilModel, PwnageModel};
//!
//! let config = SimConfig::default()
//!     .with_sybil(SybilModel::Fixed(1.0))
//!     .with_pwnage(PwnageModel::None)
//!     .with_seed(7);
//!
//! let mut engine = Engine::new(config).unwrap();
//! let outcome = engine.run().unwrap();
//! assert!(outcome.time_to_g1.is_some());
//! ```

mod adversary;
mod config;
mod context;
mod engine;
mod error;
mod guard;
mod layer;
mod rotation;
mod state;
mod topology;
pub mod time;

pub use adversary::{Adversary, PwnageDeadline, PwnageModel, SybilModel, Verdict};
pub use config::{SimConfig, DEFAULT_TICK_SECS};
pub use context::{NameAllocator, SimContext, SimRng};
pub use engine::{Engine, TickOutcome};
pub use error::{ConfigError, SimError};
pub use guard::{CompromiseState, Exposure, Guard, GuardId};
pub use layer::{GuardLayer, LayerId, StepContext};
pub use rotation::RotationPolicy;
pub use state::{CompromiseRecord, RunOutcome, SimulationState};
pub use time::SimTime;
pub use topology::{Topology, TopologySpec, MAX_GUARDS_PER_LAYER};
