use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// One position of the partition.
///
/// `resource` and `init_weight` never change once the slot exists; replacing
/// the resource means installing a brand-new slot. Only `concurrency` and
/// `last_activity` are mutated in place, and both are plain atomics.
#[derive(Debug)]
pub struct ResourceSlot<T> {
    resource: T,
    init_weight: i32,
    concurrency: AtomicU32,
    last_activity: AtomicU64,
}

impl<T> ResourceSlot<T> {
    pub fn new(resource: T, init_weight: i32, now_millis: u64) -> Self {
        Self {
            resource,
            init_weight,
            concurrency: AtomicU32::new(0),
            last_activity: AtomicU64::new(now_millis),
        }
    }

    pub fn resource(&self) -> &T {
        &self.resource
    }

    pub fn init_weight(&self) -> i32 {
        self.init_weight
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::Acquire)
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Marks one more selection in flight.
    pub fn acquire(&self, now_millis: u64) {
        self.last_activity.store(now_millis, Ordering::Relaxed);
        let _ = self
            .concurrency
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(c.saturating_add(1))
            });
    }

    /// Marks one selection finished; never drops below zero.
    pub fn release(&self, now_millis: u64) {
        self.last_activity.store(now_millis, Ordering::Relaxed);
        let _ = self
            .concurrency
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(c.saturating_sub(1))
            });
    }
}

/// Per-call copy of a slot taken while choosing a resource.
///
/// Built fresh for every selection and dropped afterwards, so a decision is
/// computed from one consistent view without locking the partition.
#[derive(Debug, Clone)]
pub struct ScoredSlot<'a, T> {
    pub resource: &'a T,
    pub init_weight: i32,
    pub live_weight: i32,
    pub concurrency: u32,
    pub last_activity: u64,
    /// `live_weight / (concurrency + 1)`, floored, never negative.
    pub score: u64,
}

impl<'a, T> ScoredSlot<'a, T> {
    pub fn capture(slot: &'a ResourceSlot<T>, live_weight: i32) -> Self {
        let concurrency = slot.concurrency();
        Self {
            resource: slot.resource(),
            init_weight: slot.init_weight(),
            live_weight,
            concurrency,
            last_activity: slot.last_activity(),
            score: score(live_weight, concurrency),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.live_weight == self.init_weight
    }
}

pub fn score(live_weight: i32, concurrency: u32) -> u64 {
    if live_weight <= 0 {
        return 0;
    }
    live_weight as u64 / (u64::from(concurrency) + 1)
}

/// Point-in-time view of a slot for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStats<T> {
    pub resource: T,
    pub init_weight: i32,
    pub concurrency: u32,
    pub last_activity_millis: u64,
}

impl<T: Clone> From<&ResourceSlot<T>> for SlotStats<T> {
    fn from(slot: &ResourceSlot<T>) -> Self {
        Self {
            resource: slot.resource().clone(),
            init_weight: slot.init_weight(),
            concurrency: slot.concurrency(),
            last_activity_millis: slot.last_activity(),
        }
    }
}
