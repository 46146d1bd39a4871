//! Deterministic per-chunk seeding.
//!
//! Placement systems that scatter content over a chunk need randomness that
//! is identical every time the chunk streams back in. These helpers combine
//! the world seed with any hashable chunk identity into a ChaCha stream.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive a u64 seed from the world seed and a chunk identity.
pub fn derive_chunk_seed(world_seed: u64, chunk: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    chunk.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic RNG for a specific chunk.
pub fn chunk_rng(world_seed: u64, chunk: &impl Hash) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_chunk_seed(world_seed, chunk))
}
