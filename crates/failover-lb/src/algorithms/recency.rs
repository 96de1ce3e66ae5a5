use crate::types::ScoredSlot;

/// Partition-wide facts that decide whether recency mode applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyObservation {
    pub no_in_flight: bool,
    pub all_healthy: bool,
    pub has_recent_activity: bool,
}

impl RecencyObservation {
    pub fn observe<T>(slots: &[ScoredSlot<'_, T>], now_millis: u64, max_idle_millis: u64) -> Self {
        let mut observed = Self {
            no_in_flight: true,
            all_healthy: true,
            has_recent_activity: false,
        };
        for slot in slots {
            if slot.concurrency > 0 {
                observed.no_in_flight = false;
            }
            if !slot.is_healthy() {
                observed.all_healthy = false;
            }
            if now_millis.saturating_sub(slot.last_activity) < max_idle_millis {
                observed.has_recent_activity = true;
            }
        }
        observed
    }

    /// Light traffic on a fully healthy partition: keep reusing the warmest
    /// resource instead of spreading calls.
    pub fn prefers_recent(&self) -> bool {
        self.no_in_flight && self.all_healthy && self.has_recent_activity
    }
}

/// Index of the slot with the latest activity; the first one wins ties.
pub fn most_recent<T>(slots: &[ScoredSlot<'_, T>]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (idx, slot) in slots.iter().enumerate() {
        match best {
            Some((_, last)) if slot.last_activity <= last => {}
            _ => best = Some((idx, slot.last_activity)),
        }
    }
    best.map(|(idx, _)| idx)
}
