//! Deterministic engine RNG.
//!
//! The state is a `(seed, draws)` pair: each draw derives a value by
//! hashing the seed and the draw counter with BLAKE3, then increments the
//! counter. Because derivation is hash-based rather than stream-based, the
//! state serializes to two integers and a checkpointed run resumes at
//! exactly the next draw on any platform.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Counter-based deterministic generator owned by one simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    seed: u64,
    draws: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { seed, draws: 0 }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&self.draws.to_le_bytes());
        let hash = hasher.finalize();
        self.draws += 1;
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("blake3 output is 32 bytes"))
    }

    /// Uniform signed fraction in `[-1, 1]` with four decimal places.
    ///
    /// Drawn as an integer in `[-10_000, 10_000]` and scaled, so the value
    /// is exact in decimal and never passes through floating point.
    pub fn signed_unit(&mut self) -> Decimal {
        let mut rng = StdRng::seed_from_u64(self.next_u64());
        let ticks: i64 = rng.gen_range(-10_000..=10_000);
        Decimal::from(ticks) / Decimal::from(10_000)
    }
}
