use super::PlacementCandidate;
use crate::domain::errors::ConfigError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// What "min size" means for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMetric {
    /// Prefer the candidate with the most free bytes (Hot).
    AvailableBytes,
    /// Prefer the candidate with the fewest stored bytes (Warm, cache).
    UsedBytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    Random,
    RoundRobin,
    MinSizeFirst(SizeMetric),
    MinCountFirst,
}

/// A chosen candidate holding a reserved slot.
pub struct Selection<C: ?Sized, R> {
    pub candidate: Arc<C>,
    pub reservation: R,
    /// Position of `candidate` in `SelectionOutcome::surviving`.
    pub index: usize,
}

/// Result of one selection round.
pub struct SelectionOutcome<C: ?Sized, R> {
    pub selected: Option<Selection<C, R>>,
    /// Candidates still in rotation, original order preserved.
    pub surviving: Vec<Arc<C>>,
    /// Candidates found incapable during this round.
    pub evicted: Vec<Arc<C>>,
}

impl PlacementStrategy {
    /// Parse a configured strategy name.
    ///
    /// `size_metric` fixes the direction of `min_size_first` for the tier.
    pub fn parse(name: &str, size_metric: SizeMetric) -> Result<Self, ConfigError> {
        match name {
            "random" => Ok(PlacementStrategy::Random),
            "round_robin" => Ok(PlacementStrategy::RoundRobin),
            "min_size_first" => Ok(PlacementStrategy::MinSizeFirst(size_metric)),
            "min_count_first" => Ok(PlacementStrategy::MinCountFirst),
            other => Err(ConfigError::UnsupportedStrategy(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlacementStrategy::Random => "random",
            PlacementStrategy::RoundRobin => "round_robin",
            PlacementStrategy::MinSizeFirst(_) => "min_size_first",
            PlacementStrategy::MinCountFirst => "min_count_first",
        }
    }

    /// Run one selection round over `candidates`.
    ///
    /// `prev_index` is the index returned by the previous round, if any.
    pub fn select<C, G>(
        &self,
        candidates: Vec<Arc<C>>,
        prev_index: Option<usize>,
        rng: &mut G,
    ) -> SelectionOutcome<C, C::Reservation>
    where
        C: PlacementCandidate + ?Sized,
        G: Rng + ?Sized,
    {
        let mut evicted_at = vec![false; candidates.len()];
        let order = self.attempt_order(&candidates, prev_index, &mut evicted_at, rng);

        let mut chosen = None;
        for position in order {
            match candidates[position].reserve() {
                Some(reservation) => {
                    chosen = Some((position, reservation));
                    break;
                }
                None => evicted_at[position] = true,
            }
        }

        let mut surviving = Vec::with_capacity(candidates.len());
        let mut evicted = Vec::new();
        let mut selected = None;

        for (position, candidate) in candidates.into_iter().enumerate() {
            if evicted_at[position] {
                evicted.push(candidate);
                continue;
            }
            if let Some((chosen_position, _)) = &chosen {
                if *chosen_position == position {
                    selected = Some(surviving.len());
                }
            }
            surviving.push(candidate);
        }

        let selected = selected.zip(chosen).map(|(index, (_, reservation))| Selection {
            candidate: Arc::clone(&surviving[index]),
            reservation,
            index,
        });

        SelectionOutcome {
            selected,
            surviving,
            evicted,
        }
    }

    /// Positions to try, in order. Min-* strategies pre-evict inadmissible
    /// candidates before ranking.
    fn attempt_order<C, G>(
        &self,
        candidates: &[Arc<C>],
        prev_index: Option<usize>,
        evicted_at: &mut [bool],
        rng: &mut G,
    ) -> Vec<usize>
    where
        C: PlacementCandidate + ?Sized,
        G: Rng + ?Sized,
    {
        let len = candidates.len();
        match self {
            PlacementStrategy::Random => {
                let mut order: Vec<usize> = (0..len).collect();
                order.shuffle(rng);
                order
            }
            PlacementStrategy::RoundRobin => match prev_index.filter(|prev| *prev < len) {
                Some(prev) => (prev + 1..len).chain(0..prev).chain([prev]).collect(),
                None => (0..len).collect(),
            },
            PlacementStrategy::MinSizeFirst(metric) => {
                let mut order = admissible(candidates, evicted_at);
                match metric {
                    SizeMetric::AvailableBytes => order.sort_by_key(|&i| {
                        std::cmp::Reverse(candidates[i].available_bytes())
                    }),
                    SizeMetric::UsedBytes => order.sort_by_key(|&i| candidates[i].used_bytes()),
                }
                order
            }
            PlacementStrategy::MinCountFirst => {
                let mut order = admissible(candidates, evicted_at);
                order.sort_by_key(|&i| candidates[i].block_count());
                order
            }
        }
    }
}

fn admissible<C>(candidates: &[Arc<C>], evicted_at: &mut [bool]) -> Vec<usize>
where
    C: PlacementCandidate + ?Sized,
{
    let mut order = Vec::with_capacity(candidates.len());
    for (position, candidate) in candidates.iter().enumerate() {
        if candidate.is_admissible() {
            order.push(position);
        } else {
            evicted_at[position] = true;
        }
    }
    order
}
