use super::RandomSource;
use crate::types::ScoredSlot;

/// Roulette-wheel draw over slot scores.
///
/// Returns `None` when the scores sum to zero. A draw that falls past the end
/// of the wheel lands on the first slot.
pub fn roulette<T>(slots: &[ScoredSlot<'_, T>], rng: &RandomSource) -> Option<usize> {
    let total = slots
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.score));
    if total == 0 {
        return None;
    }
    let draw = rng.below(total);
    let mut cumulative = 0u64;
    for (idx, slot) in slots.iter().enumerate() {
        cumulative = cumulative.saturating_add(slot.score);
        if draw < cumulative {
            return Some(idx);
        }
    }
    Some(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceSlot;

    #[test]
    fn frequencies_follow_concurrency_adjusted_scores() {
        let raw: Vec<_> = (0..3).map(|i| ResourceSlot::new(i, 10, 0)).collect();
        raw[0].acquire(0);
        let scored: Vec<_> = raw.iter().map(|s| ScoredSlot::capture(s, 10)).collect();
        assert_eq!(
            scored.iter().map(|s| s.score).collect::<Vec<_>>(),
            vec![5, 10, 10]
        );

        let rng = RandomSource::seeded(7);
        let mut counts = [0usize; 3];
        let rounds = 50_000;
        for _ in 0..rounds {
            counts[roulette(&scored, &rng).unwrap()] += 1;
        }
        let expected = [0.2, 0.4, 0.4];
        for (count, want) in counts.iter().zip(expected) {
            let got = *count as f64 / rounds as f64;
            assert!((got - want).abs() < 0.02, "got {got}, want {want}");
        }
    }

    #[test]
    fn zero_score_slots_are_never_drawn() {
        let raw: Vec<_> = (0..3).map(|i| ResourceSlot::new(i, 10, 0)).collect();
        let weights = [0, 10, 0];
        let scored: Vec<_> = raw
            .iter()
            .zip(weights)
            .map(|(s, w)| ScoredSlot::capture(s, w))
            .collect();
        let rng = RandomSource::ThreadLocal;
        for _ in 0..200 {
            assert_eq!(roulette(&scored, &rng), Some(1));
        }
    }
}
