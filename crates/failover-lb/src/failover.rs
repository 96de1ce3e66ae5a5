use std::collections::HashSet;
use std::sync::Arc;

use failover_core::{Resource, WeightedPool};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::partition::{new_slot, PartitionSelector};

impl<T: Resource, P: WeightedPool<T>> PartitionSelector<T, P> {
    /// Swaps `resource` out of the partition for an available pool member
    /// that is not already in it.
    ///
    /// Works on one snapshot and publishes with a single store, without
    /// compare-and-swap. Two racing replacements of the same slot both
    /// publish and the last one wins; either result is a complete partition
    /// built from a real snapshot. Returns whether a new partition was
    /// published.
    pub(crate) fn replace(&self, resource: &T) -> bool {
        let snapshot = self.partition.load_full();
        if snapshot.len() >= self.pool.get_all().len() {
            debug!("[{}] no spare resources to replace with", self.name);
            return false;
        }
        let Some(index) = snapshot.iter().position(|slot| slot.resource() == resource) else {
            // already rotated out, possibly by a concurrent replacement
            return false;
        };

        let exclude: HashSet<T> = snapshot.iter().map(|slot| slot.resource().clone()).collect();
        let Some(fresh) = self.pool.get_one_available_exclude(&exclude) else {
            metrics::REPLACEMENT_EXHAUSTED_TOTAL.inc();
            warn!(
                "[{}] no available resource to replace slot {}, keeping degraded member",
                self.name, index
            );
            return false;
        };

        let slot = Arc::new(new_slot(self.pool.as_ref(), fresh, self.clock.now_millis()));
        let mut next = snapshot.as_ref().clone();
        next[index] = slot;
        self.partition.store(Arc::new(next));
        metrics::REPLACEMENTS_TOTAL.inc();
        info!("[{}] replaced partition slot {}", self.name, index);
        true
    }
}
