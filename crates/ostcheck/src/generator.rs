use core::num::NonZeroUsize;

use ostcheck_primitives::case::TestCase;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chance that a step removes a present key rather than inserting one.
pub const REMOVE_PROBABILITY: f64 = 0.3;

/// Synthesizes random insert/remove scripts that leave the tree empty.
///
/// Keys are tracked as a plain sequence, so the same key may be inserted
/// several times and exercise the duplicate counters.
#[derive(Debug)]
pub struct CaseGenerator<R> {
    rng: R,
}

impl CaseGenerator<StdRng> {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> CaseGenerator<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Produces `depth` random steps over keys in `[0, depth)`, followed by
    /// removals of everything still present.
    pub fn generate(&mut self, depth: NonZeroUsize) -> Vec<TestCase> {
        let key_space = u64::try_from(depth.get()).unwrap_or(u64::MAX);

        let mut present: Vec<u64> = Vec::new();
        let mut cases = Vec::with_capacity(depth.get().saturating_mul(2));

        for _ in 0..depth.get() {
            if self.rng.gen_bool(REMOVE_PROBABILITY) && !present.is_empty() {
                cases.push(self.remove_any(&mut present));
            } else {
                let key = self.rng.gen_range(0..key_space);
                present.push(key);
                cases.push(TestCase::insert(key));
            }
        }

        while !present.is_empty() {
            cases.push(self.remove_any(&mut present));
        }

        cases
    }

    fn remove_any(&mut self, present: &mut Vec<u64>) -> TestCase {
        let position = self.rng.gen_range(0..present.len());

        TestCase::remove(present.remove(position))
    }
}
