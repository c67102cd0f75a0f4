//! Per-run simulation context backed by a seeded RNG and a name allocator.

use crate::guard::GuardId;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Random source used by every sampling decision in a run.
pub type SimRng = ChaCha8Rng;

/// Hands out guard identities for a single run.
///
/// Names are `node1`, `node2`, ... in creation order. Each run owns its own
/// allocator so concurrent or consecutive runs never share a sequence.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    issued: u64,
}

impl NameAllocator {
    /// Creates an allocator whose first identity is `node1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next guard identity.
    pub fn next_id(&mut self) -> GuardId {
        self.issued += 1;
        GuardId::new(self.issued)
    }

    /// Returns how many identities have been handed out.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

/// Simulation context owning all sources of non-determinism for one run.
///
/// Two contexts built from the same seed replay the exact same sequence of
/// sybil rolls, rotation deadlines and pwnage deadlines.
pub struct SimContext {
    /// Master seed for this run
    seed: u64,

    /// Deterministic RNG for every stochastic decision
    rng: SimRng,

    /// Guard identity sequence
    names: NameAllocator,
}

impl SimContext {
    /// Creates a new context with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            names: NameAllocator::new(),
        }
    }

    /// Returns the seed this context was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the run's random source.
    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Allocates a fresh guard identity.
    pub fn next_guard_id(&mut self) -> GuardId {
        self.names.next_id()
    }

    /// Returns the name allocator.
    pub fn names(&self) -> &NameAllocator {
        &self.names
    }
}
