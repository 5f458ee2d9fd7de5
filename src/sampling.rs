//! Reservoir sampling of size 1, and the small "with probability 1/n" helper
//! used throughout candidate selection.
//!
//! A category of peers (or addresses) may hold thousands of entries; we must
//! never materialise a `Vec` of them just to pick one at random. Reservoir
//! sampling of size 1 gives a uniform pick in a single streaming pass: when
//! the nth candidate is examined, it replaces the one currently held with
//! probability `1/n`.

use rand::Rng;

/// Streaming uniform-random pick of one item from a sequence of unknown length.
#[derive(Debug, Default)]
pub struct Reservoir<T> {
    count: u32,
    chosen: Option<T>,
}

impl<T> Reservoir<T> {
    pub fn new() -> Self {
        Reservoir {
            count: 0,
            chosen: None,
        }
    }

    /// Consider one more candidate, possibly replacing the current pick.
    pub fn consider(&mut self, item: T) {
        self.consider_with(item, &mut rand::thread_rng());
    }

    /// Like [`Reservoir::consider`], but with an injectable RNG (for
    /// deterministic tests).
    pub fn consider_with<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) {
        self.count += 1;
        if random_n_with(self.count, rng) == 0 {
            self.chosen = Some(item);
        }
    }

    /// Number of candidates considered so far.
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Consume the reservoir, returning whatever was picked (if anything was
    /// ever considered).
    pub fn into_inner(self) -> Option<T> {
        self.chosen
    }
}

/// `true` with probability `1/n` (n == 0 is treated as "never").
pub fn random_n(n: u32) -> bool {
    random_n_with(n, &mut rand::thread_rng()) == 0
}

fn random_n_with<R: Rng + ?Sized>(n: u32, rng: &mut R) -> u32 {
    if n == 0 {
        return 1;
    }
    rng.gen_range(0..n)
}
