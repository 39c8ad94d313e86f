//! Random source seam.
//!
//! The generator never calls `rand` directly; it draws through
//! [`RandomSource`] so tests can force specific branches and picks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform draws used by the generator.
pub trait RandomSource {
    /// Returns a uniform sample from `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Returns a uniform index into a collection of length `len`, or
    /// `None` when `len == 0`.
    fn index(&mut self, len: usize) -> Option<usize>;
}

/// Picks a uniformly random element of `items`.
pub fn choose<'a, T, R>(rng: &mut R, items: &'a [T]) -> Option<&'a T>
where
    R: RandomSource + ?Sized,
{
    rng.index(items.len()).and_then(|i| items.get(i))
}

/// Production source backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct SystemRandom {
    rng: StdRng,
}

impl SystemRandom {
    /// Seeds from the operating system.
    #[must_use]
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic source for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SystemRandom {
    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.random_range(0..len))
    }
}
