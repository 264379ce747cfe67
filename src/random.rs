//! Random source — pseudo-random integers for the producer
//!
//! A generator is seeded once when it is created and never reseeded.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplier of pseudo-random signed integers
pub trait RandomSource: Send {
    fn next_i32(&mut self) -> i32;
}

/// Seed derived from the wall clock (seconds since the Unix epoch)
pub fn time_seed() -> u64 {
    Utc::now().timestamp() as u64
}

/// Seed-once generator yielding values in `0..=i32::MAX`
#[derive(Debug, Clone)]
pub struct SeededRandom {
    seed: u64,
    rng: StdRng,
}

impl SeededRandom {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from the current time
    pub fn from_time() -> Self {
        Self::with_seed(time_seed())
    }

    /// The seed this generator started from
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRandom {
    fn next_i32(&mut self) -> i32 {
        self.rng.gen_range(0..=i32::MAX)
    }
}
