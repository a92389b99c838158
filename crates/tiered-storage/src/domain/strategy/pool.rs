use super::{PlacementCandidate, PlacementStrategy, Selection};
use rand::Rng;
use std::sync::Arc;

/// Candidates of one tier: those in rotation and those evicted.
///
/// Owned by the tier behind its own lock; every selection narrows `active`.
pub struct VolumePool<C: ?Sized> {
    active: Vec<Arc<C>>,
    unable: Vec<Arc<C>>,
    prev_index: Option<usize>,
}

impl<C: PlacementCandidate + ?Sized> VolumePool<C> {
    pub fn new(active: Vec<Arc<C>>) -> Self {
        Self {
            active,
            unable: Vec::new(),
            prev_index: None,
        }
    }

    /// Select and reserve, moving incapable candidates to the unable set.
    pub fn select<G: Rng + ?Sized>(
        &mut self,
        strategy: PlacementStrategy,
        rng: &mut G,
    ) -> Option<Selection<C, C::Reservation>> {
        let candidates = std::mem::take(&mut self.active);
        let outcome = strategy.select(candidates, self.prev_index, rng);

        for candidate in &outcome.evicted {
            tracing::warn!(
                "[placement] evicting {} from rotation ({})",
                candidate.label(),
                strategy.name()
            );
        }

        self.active = outcome.surviving;
        self.unable.extend(outcome.evicted);
        if let Some(selection) = &outcome.selected {
            self.prev_index = Some(selection.index);
        }
        outcome.selected
    }

    /// Take a candidate out of rotation after a failed write.
    pub fn evict(&mut self, candidate: &Arc<C>) {
        if let Some(position) = self.active.iter().position(|c| Arc::ptr_eq(c, candidate)) {
            let removed = self.active.remove(position);
            self.unable.push(removed);
            self.prev_index = match self.prev_index {
                Some(prev) if prev > position => Some(prev - 1),
                Some(prev) if prev == position => position.checked_sub(1),
                other => other,
            };
        }
    }

    /// Add a candidate that starts out of rotation.
    pub fn park(&mut self, candidate: Arc<C>) {
        self.unable.push(candidate);
    }

    /// Return evicted candidates that pass admission again.
    ///
    /// Returns the number of candidates readmitted.
    pub fn readmit(&mut self) -> usize {
        let (back, still_unable): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unable)
            .into_iter()
            .partition(|c| c.is_admissible());
        let count = back.len();
        for candidate in &back {
            tracing::info!("[placement] readmitting {}", candidate.label());
        }
        self.active.extend(back);
        self.unable = still_unable;
        count
    }

    pub fn active(&self) -> &[Arc<C>] {
        &self.active
    }

    pub fn unable(&self) -> &[Arc<C>] {
        &self.unable
    }

    /// Every candidate, in rotation or not.
    pub fn all(&self) -> impl Iterator<Item = &Arc<C>> {
        self.active.iter().chain(self.unable.iter())
    }
}
