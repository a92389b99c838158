use crate::domain::strategy::{PlacementCandidate, PlacementStrategy, Selection, VolumePool};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// A tier's candidate pool together with the randomness its strategy uses.
///
/// Always held behind the tier's lock.
pub(crate) struct Rotation<C: ?Sized> {
    pub(crate) pool: VolumePool<C>,
    rng: StdRng,
}

impl<C: PlacementCandidate + ?Sized> Rotation<C> {
    pub(crate) fn new(candidates: Vec<Arc<C>>) -> Self {
        Self {
            pool: VolumePool::new(candidates),
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the randomness with a seeded generator. The pool is kept as is.
    pub(crate) fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub(crate) fn select(
        &mut self,
        strategy: PlacementStrategy,
    ) -> Option<Selection<C, C::Reservation>> {
        self.pool.select(strategy, &mut self.rng)
    }

    /// Candidate owning `matches`, in rotation or not.
    pub(crate) fn find(&self, matches: impl Fn(&C) -> bool) -> Option<Arc<C>> {
        self.pool.all().find(|c| matches(c)).cloned()
    }

    pub(crate) fn all(&self) -> Vec<Arc<C>> {
        self.pool.all().cloned().collect()
    }
}
