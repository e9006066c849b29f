//! Randomness that only has to be spread out, not unpredictable:
//! retransmission jitter.
//!
//! A [`ConfigBuilder::rng_seed`](crate::ConfigBuilder::rng_seed) makes it
//! reproducible. Protocol randoms always come from the crypto provider.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub enum JitterRng {
    Seeded(StdRng),
    Thread,
}

impl JitterRng {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => JitterRng::Seeded(StdRng::seed_from_u64(seed)),
            None => JitterRng::Thread,
        }
    }

    /// Uniform in `range`, which must not be empty.
    pub fn in_range(&mut self, range: Range<f32>) -> f32 {
        match self {
            JitterRng::Seeded(rng) => rng.gen_range(range),
            JitterRng::Thread => rand::thread_rng().gen_range(range),
        }
    }
}

impl std::fmt::Debug for JitterRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JitterRng::Seeded(_) => f.write_str("JitterRng::Seeded"),
            JitterRng::Thread => f.write_str("JitterRng::Thread"),
        }
    }
}
