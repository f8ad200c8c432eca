//! Random number generation.
//!
//! The server only needs uniform integers in a closed range. The
//! [`RandomSource`] trait is what the rest of the crate depends on; the
//! self-test harness drives it with stubs in tests.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform integer source.
pub trait RandomSource: Send + Sync {
    /// One value in `[min, max]`. The bounds may be given in either order.
    fn draw_uniform(&self, min: i32, max: i32) -> i32;

    /// `count` values in `[min, max]`.
    fn draw_batch(&self, count: usize, min: i32, max: i32) -> Vec<i32> {
        (0..count).map(|_| self.draw_uniform(min, max)).collect()
    }
}

/// Thread-safe engine seeded from OS entropy.
pub struct RngEngine {
    inner: Mutex<StdRng>,
}

impl RngEngine {
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic engine, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { inner: Mutex::new(rng) }
    }
}

impl RandomSource for RngEngine {
    fn draw_uniform(&self, min: i32, max: i32) -> i32 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        self.inner.lock().gen_range(low..=high)
    }

    fn draw_batch(&self, count: usize, min: i32, max: i32) -> Vec<i32> {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        let mut rng = self.inner.lock();
        (0..count).map(|_| rng.gen_range(low..=high)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_in_range() {
        let engine = RngEngine::seeded(7);
        for _ in 0..1_000 {
            let value = engine.draw_uniform(1, 6);
            assert!((1..=6).contains(&value));
        }
        assert!(engine.draw_batch(500, 3, -3).iter().all(|v| (-3..=3).contains(v)));
    }

    #[test]
    fn degenerate_range() {
        let engine = RngEngine::seeded(1);
        assert_eq!(engine.draw_uniform(4, 4), 4);
    }

    #[test]
    fn seeded_engines_agree() {
        let a = RngEngine::seeded(42);
        let b = RngEngine::seeded(42);
        assert_eq!(a.draw_batch(64, 1, 100), b.draw_batch(64, 1, 100));
    }
}
