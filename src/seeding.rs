//! Determinism Seeder
//!
//! Reproducibility is handled in two parts. The tensor backend's global RNG
//! (which drives parameter initialization) is seeded once, before any model
//! or loader is constructed. All host-side randomness (loader shuffling,
//! identity sampling) avoids process-global generators entirely: every
//! consumer receives its own `ChaCha8Rng` derived from the configured seed
//! and a per-component stream id.
//!
//! When no seed is configured nothing is seeded and host-side generators are
//! initialized from OS entropy, so two runs are not guaranteed identical.
//!
//! Burn backends select their algorithms statically, so there is no
//! benchmark/auto-tuning mode to disable.

use burn::tensor::backend::Backend;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Stream ids for the host-side RNG consumers.
///
/// Each component mixes its stream into the run seed so that adding a
/// consumer never shifts the random sequence observed by another.
pub mod streams {
    /// Train loaders; dataset index is added on top of this base.
    pub const TRAIN_LOADER: u64 = 0x10;
}

/// Seed the tensor backend RNG if a seed is configured.
///
/// Must run exactly once, before any model or loader construction, since
/// model initialization consumes backend RNG state. Returns whether seeding
/// was applied.
pub fn apply_determinism<B: Backend>(seed: Option<u64>) -> bool {
    match seed {
        Some(seed) => {
            info!("Setting the seed to {}", seed);
            B::seed(seed);
            true
        }
        None => false,
    }
}

/// Derive the RNG for one host-side component.
///
/// With a configured seed the result is a deterministic function of
/// `(seed, stream)`; without one the generator is drawn from entropy.
pub fn component_rng(seed: Option<u64>, stream: u64) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => ChaCha8Rng::from_entropy(),
    }
}
