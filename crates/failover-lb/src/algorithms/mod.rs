//! Slot selection strategies.
//!
//! A selection call first checks whether the partition is idle and healthy
//! enough for [`recency`] mode; otherwise it falls back to
//! [`weighted_random`] roulette over per-slot scores.

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::types::ScoredSlot;

pub mod recency;
pub mod weighted_random;

pub use recency::{most_recent, RecencyObservation};
pub use weighted_random::roulette;

/// Outcome of one selection over a scored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Most recently active slot, chosen because the partition is idle.
    Recent(usize),
    /// Slot drawn by weighted-random roulette.
    Weighted(usize),
    /// Every slot scored zero.
    Exhausted,
}

impl Selection {
    pub fn index(&self) -> Option<usize> {
        match *self {
            Self::Recent(idx) | Self::Weighted(idx) => Some(idx),
            Self::Exhausted => None,
        }
    }
}

/// Uniform random source for roulette draws.
#[derive(Debug)]
pub enum RandomSource {
    ThreadLocal,
    Seeded(Mutex<StdRng>),
}

impl RandomSource {
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or(Self::ThreadLocal, Self::seeded)
    }

    /// Uniform value in `[0, bound)`; `bound` must be positive.
    pub fn below(&self, bound: u64) -> u64 {
        match self {
            Self::ThreadLocal => rand::rng().random_range(0..bound),
            Self::Seeded(rng) => rng.lock().random_range(0..bound),
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::ThreadLocal
    }
}

pub fn select<T>(
    slots: &[ScoredSlot<'_, T>],
    now_millis: u64,
    max_idle_millis: u64,
    rng: &RandomSource,
) -> Selection {
    if slots.is_empty() {
        return Selection::Exhausted;
    }
    let observed = RecencyObservation::observe(slots, now_millis, max_idle_millis);
    if max_idle_millis > 0 && observed.prefers_recent() {
        if let Some(idx) = most_recent(slots) {
            return Selection::Recent(idx);
        }
    }
    roulette(slots, rng).map_or(Selection::Exhausted, Selection::Weighted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceSlot;

    /// One slot per `(concurrency, last_activity)` pair, baseline weight 10.
    fn slots(layout: &[(u32, u64)]) -> Vec<ResourceSlot<usize>> {
        layout
            .iter()
            .enumerate()
            .map(|(i, &(concurrency, last))| {
                let slot = ResourceSlot::new(i, 10, last);
                for _ in 0..concurrency {
                    slot.acquire(last);
                }
                slot
            })
            .collect()
    }

    fn scored<'a>(slots: &'a [ResourceSlot<usize>], weights: &[i32]) -> Vec<ScoredSlot<'a, usize>> {
        slots
            .iter()
            .zip(weights)
            .map(|(s, &w)| ScoredSlot::capture(s, w))
            .collect()
    }

    #[test]
    fn idle_healthy_partition_uses_recency() {
        let raw = slots(&[(0, 100), (0, 300), (0, 200)]);
        let s = scored(&raw, &[10, 10, 10]);
        let rng = RandomSource::seeded(1);
        assert_eq!(select(&s, 400, 1_000, &rng), Selection::Recent(1));
    }

    #[test]
    fn in_flight_partition_uses_roulette() {
        let raw = slots(&[(1, 100), (0, 300), (0, 200)]);
        let s = scored(&raw, &[10, 10, 10]);
        let rng = RandomSource::seeded(1);
        assert!(matches!(select(&s, 400, 1_000, &rng), Selection::Weighted(_)));
    }

    #[test]
    fn zero_idle_window_disables_recency() {
        let raw = slots(&[(0, 100), (0, 300)]);
        let s = scored(&raw, &[10, 10]);
        let rng = RandomSource::seeded(1);
        assert!(matches!(select(&s, 300, 0, &rng), Selection::Weighted(_)));
    }

    #[test]
    fn all_zero_scores_are_exhausted() {
        let raw = slots(&[(0, 100), (0, 300)]);
        let s = scored(&raw, &[0, -1]);
        let rng = RandomSource::seeded(1);
        assert_eq!(select(&s, 300, 1_000, &rng), Selection::Exhausted);
        assert_eq!(select::<usize>(&[], 300, 1_000, &rng), Selection::Exhausted);
    }

    #[test]
    fn seeded_sources_repeat() {
        let a = RandomSource::seeded(42);
        let b = RandomSource::seeded(42);
        let xs: Vec<_> = (0..16).map(|_| a.below(1_000)).collect();
        let ys: Vec<_> = (0..16).map(|_| b.below(1_000)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| *x < 1_000));
    }
}
