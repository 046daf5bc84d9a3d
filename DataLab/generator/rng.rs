use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random stream used for every generation step.
///
/// ChaCha8 output is specified independently of platform and crate version,
/// which keeps seeded datasets bit-identical across machines.
pub type DataRng = ChaCha8Rng;

/// Returns a reproducible stream for `seed`.
#[must_use]
pub fn seeded_rng(seed: u64) -> DataRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Draws a fresh seed for callers that want a new roll.
#[must_use]
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}
