use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use failover_core::{Failover, FailoverError, Resource, Result, WeightFailover, WeightedPool};
use tracing::{debug, info};

use crate::algorithms::{self, RandomSource};
use crate::clock::{Clock, MonotonicClock};
use crate::metrics;
use crate::types::{ResourceSlot, ScoredSlot, SlotStats};

pub(crate) type Partition<T> = Vec<Arc<ResourceSlot<T>>>;

/// Client-side selector that keeps a fixed-size "warm" subset of a weighted
/// pool and picks one of its members per request.
///
/// The partition is published behind an [`ArcSwap`]: readers take one atomic
/// snapshot per call and replacements swap in a complete new vector, so no
/// reader ever sees a half-built partition. Per-slot in-flight counters and
/// activity timestamps are atomics mutated in place.
pub struct PartitionSelector<T: Resource, P: WeightedPool<T> = WeightFailover<T>> {
    pub(crate) name: String,
    pub(crate) pool: Arc<P>,
    pub(crate) partition: ArcSwap<Partition<T>>,
    pub(crate) max_idle_millis: u64,
    pub(crate) clock: Arc<dyn Clock>,
    rng: RandomSource,
}

impl<T: Resource, P: WeightedPool<T>> PartitionSelector<T, P> {
    /// Builds a selector over `pool` with the default clock and a thread-local
    /// random source.
    pub fn new(pool: Arc<P>, core_partition_size: usize, max_idle_millis: u64) -> Result<Self> {
        Self::from_parts(
            "partition".to_string(),
            pool,
            core_partition_size,
            max_idle_millis,
            Arc::new(MonotonicClock::new()),
            RandomSource::ThreadLocal,
        )
    }

    pub(crate) fn from_parts(
        name: String,
        pool: Arc<P>,
        core_partition_size: usize,
        max_idle_millis: u64,
        clock: Arc<dyn Clock>,
        rng: RandomSource,
    ) -> Result<Self> {
        if core_partition_size == 0 {
            return Err(FailoverError::invalid_config(
                "core partition size has to be positive",
            ));
        }
        if max_idle_millis == 0 {
            return Err(FailoverError::invalid_config(
                "max external pool idle millis has to be positive",
            ));
        }
        let universe = pool.get_all().len();
        if universe == 0 {
            return Err(FailoverError::invalid_config("resources must not be empty"));
        }
        if core_partition_size > universe {
            return Err(FailoverError::invalid_config(format!(
                "core partition size {} exceeds {} resources",
                core_partition_size, universe
            )));
        }

        let now = clock.now_millis();
        let mut drawn = HashSet::with_capacity(core_partition_size);
        let mut partition = Vec::with_capacity(core_partition_size);
        for _ in 0..core_partition_size {
            let resource = pool.get_one_available_exclude(&drawn).ok_or_else(|| {
                FailoverError::NoAvailableResource(format!(
                    "only {} of {} partition slots could be filled",
                    partition.len(),
                    core_partition_size
                ))
            })?;
            drawn.insert(resource.clone());
            partition.push(Arc::new(new_slot(pool.as_ref(), resource, now)));
        }

        info!(
            "[{}] partition selector created: {} of {} resources, idle window {}ms",
            name, core_partition_size, universe, max_idle_millis
        );
        Ok(Self {
            name,
            pool,
            partition: ArcSwap::from_pointee(partition),
            max_idle_millis,
            clock,
            rng,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    pub fn core_partition_size(&self) -> usize {
        self.partition.load().len()
    }

    /// Resources currently in the partition, in slot order.
    pub fn partition(&self) -> Vec<T> {
        self.partition
            .load()
            .iter()
            .map(|slot| slot.resource().clone())
            .collect()
    }

    pub fn slot_stats(&self) -> Vec<SlotStats<T>> {
        self.partition
            .load()
            .iter()
            .map(|slot| SlotStats::from(slot.as_ref()))
            .collect()
    }

    fn lookup(partition: &Partition<T>, resource: &T) -> Option<Arc<ResourceSlot<T>>> {
        partition
            .iter()
            .find(|slot| slot.resource() == resource)
            .cloned()
    }

    /// Finishes one in-flight selection of `resource`. Resources already
    /// rotated out of the partition are ignored.
    fn release(&self, resource: &T) {
        let partition = self.partition.load_full();
        match Self::lookup(&partition, resource) {
            Some(slot) => slot.release(self.clock.now_millis()),
            None => debug!("[{}] report for resource outside the partition", self.name),
        }
    }
}

pub(crate) fn new_slot<T: Resource, P: WeightedPool<T>>(
    pool: &P,
    resource: T,
    now_millis: u64,
) -> ResourceSlot<T> {
    let init_weight = pool
        .init_weight(&resource)
        .unwrap_or_else(|| pool.current_weight(&resource));
    ResourceSlot::new(resource, init_weight, now_millis)
}

impl<T: Resource, P: WeightedPool<T>> Failover<T> for PartitionSelector<T, P> {
    fn get_all(&self) -> Vec<T> {
        self.pool.get_all()
    }

    fn get_available(&self) -> Vec<T> {
        let available: HashSet<T> = self.pool.get_available().into_iter().collect();
        self.partition
            .load()
            .iter()
            .filter(|slot| available.contains(slot.resource()))
            .map(|slot| slot.resource().clone())
            .collect()
    }

    fn get_available_n(&self, _n: isize) -> Result<Vec<T>> {
        Err(FailoverError::UnsupportedOperation(
            "a partition selector cannot pick n of its members",
        ))
    }

    fn get_one_available(&self) -> Option<T> {
        let now = self.clock.now_millis();
        let partition = self.partition.load_full();
        let scored: Vec<ScoredSlot<'_, T>> = partition
            .iter()
            .map(|slot| ScoredSlot::capture(slot, self.pool.current_weight(slot.resource())))
            .collect();

        let selection = algorithms::select(&scored, now, self.max_idle_millis, &self.rng);
        metrics::record_selection(&selection);
        let Some(idx) = selection.index() else {
            debug!("[{}] no resource with a positive score", self.name);
            return None;
        };
        let slot = &partition[idx];
        slot.acquire(now);
        Some(slot.resource().clone())
    }

    fn get_failed(&self) -> HashSet<T> {
        self.pool.get_failed()
    }

    fn success(&self, resource: &T) {
        self.pool.success(resource);
        self.release(resource);
    }

    fn fail(&self, resource: &T) {
        self.pool.fail(resource);
        self.release(resource);
        if self.pool.current_weight(resource) <= 0 {
            self.replace(resource);
        }
    }

    fn down(&self, resource: &T) {
        self.pool.down(resource);
        self.release(resource);
        self.replace(resource);
    }

    fn close(&self) {
        self.pool.close();
    }
}

impl<T, P> fmt::Debug for PartitionSelector<T, P>
where
    T: Resource + fmt::Debug,
    P: WeightedPool<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionSelector")
            .field("name", &self.name)
            .field("partition", &self.partition())
            .field("max_idle_millis", &self.max_idle_millis)
            .finish()
    }
}
