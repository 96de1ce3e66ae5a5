use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use failover_core::{
    Failover, FailoverError, Resource, Result, WeightFailover, WeightFailoverBuilder, WeightedPool,
};

use crate::algorithms::RandomSource;
use crate::clock::{Clock, MonotonicClock};
use crate::partition::PartitionSelector;

/// Configuration for a [`PartitionSelector`].
///
/// `core_partition_size` and `external_pool` have no defaults and must be set.
/// Everything else is forwarded to the underlying [`WeightFailoverBuilder`].
pub struct PartitionSelectorBuilder<T: Resource> {
    weight: WeightFailoverBuilder<T>,
    name: Option<String>,
    core_partition_size: usize,
    max_idle_millis: u64,
    seed: Option<u64>,
    clock: Option<Arc<dyn Clock>>,
}

impl<T: Resource> Default for PartitionSelectorBuilder<T> {
    fn default() -> Self {
        Self {
            weight: WeightFailoverBuilder::new(),
            name: None,
            core_partition_size: 0,
            max_idle_millis: 0,
            seed: None,
            clock: None,
        }
    }
}

impl<T: Resource> PartitionSelectorBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn core_partition_size(mut self, size: usize) -> Self {
        self.core_partition_size = size;
        self
    }

    /// Idle window for recency mode: while every member is healthy and idle,
    /// and one was active within `max_idle`, the most recent one is reused.
    /// Sub-millisecond windows round up to one millisecond.
    pub fn external_pool(mut self, max_idle: Duration) -> Self {
        let millis = max_idle.as_nanos().div_ceil(1_000_000);
        self.max_idle_millis = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn max_external_pool_idle_millis(mut self, millis: u64) -> Self {
        self.max_idle_millis = millis;
        self
    }

    /// Seeds the selection RNG for reproducible draws.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.weight = self.weight.name(name.clone());
        self.name = Some(name);
        self
    }

    pub fn auto_add_on_missing(mut self, weight: i32) -> Self {
        self.weight = self.weight.auto_add_on_missing(weight);
        self
    }

    pub fn min_weight(mut self, weight: i32) -> Self {
        self.weight = self.weight.min_weight(weight);
        self
    }

    pub fn fail_reduce(mut self, weight: i32) -> Self {
        self.weight = self.weight.fail_reduce(weight);
        self
    }

    pub fn fail_reduce_rate(mut self, rate: f64) -> Self {
        self.weight = self.weight.fail_reduce_rate(rate);
        self
    }

    pub fn success_increase(mut self, weight: i32) -> Self {
        self.weight = self.weight.success_increase(weight);
        self
    }

    pub fn success_increase_rate(mut self, rate: f64) -> Self {
        self.weight = self.weight.success_increase_rate(rate);
        self
    }

    pub fn check_period(mut self, period: Duration) -> Self {
        self.weight = self.weight.check_period(period);
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.weight = self.weight.filter(filter);
        self
    }

    pub fn checker<F>(mut self, checker: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        self.weight = self.weight.checker(checker);
        self
    }

    pub fn bool_checker<F>(mut self, checker: F, recovered_init_rate: f64) -> Self
    where
        F: Fn(&T) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.weight = self.weight.bool_checker(checker, recovered_init_rate);
        self
    }

    pub fn on_min_weight<F>(mut self, listener: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.weight = self.weight.on_min_weight(listener);
        self
    }

    pub fn on_recovered<F>(mut self, listener: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.weight = self.weight.on_recovered(listener);
        self
    }

    pub fn build<I>(self, resources: I, init_weight: i32) -> Result<PartitionSelector<T>>
    where
        I: IntoIterator<Item = T>,
    {
        self.build_weighted(resources.into_iter().map(|r| (r, init_weight)))
    }

    pub fn build_default<I>(self, resources: I) -> Result<PartitionSelector<T>>
    where
        I: IntoIterator<Item = T>,
    {
        self.build(resources, failover_core::DEFAULT_INIT_WEIGHT)
    }

    pub fn build_weighted<I>(mut self, resources: I) -> Result<PartitionSelector<T>>
    where
        I: IntoIterator<Item = (T, i32)>,
    {
        self.ensure()?;
        let resources: Vec<(T, i32)> = resources.into_iter().collect();
        let distinct = resources.iter().map(|(r, _)| r).collect::<HashSet<_>>().len();
        if distinct == 0 {
            return Err(FailoverError::invalid_config("resources must not be empty"));
        }
        if self.core_partition_size > distinct {
            return Err(FailoverError::invalid_config(format!(
                "illegal core partition size {} for {} resources",
                self.core_partition_size, distinct
            )));
        }

        let weight = std::mem::take(&mut self.weight);
        let pool: Arc<WeightFailover<T>> = weight.build_weighted(resources)?;
        let name = self.name.take().unwrap_or_else(|| pool.name().to_string());
        self.assemble(name, Arc::clone(&pool)).map_err(|e| {
            pool.close();
            e
        })
    }

    /// Layers the selector over an existing pool. Pass-through pool options
    /// set on this builder are not applied to `pool`, and the pool stays
    /// open when assembly fails.
    pub fn build_with_pool<P: WeightedPool<T>>(
        mut self,
        pool: Arc<P>,
    ) -> Result<PartitionSelector<T, P>> {
        self.ensure()?;
        let name = self.name.take().unwrap_or_else(|| "partition".to_string());
        self.assemble(name, pool)
    }

    fn ensure(&self) -> Result<()> {
        if self.core_partition_size == 0 {
            return Err(FailoverError::invalid_config(
                "core partition size has to be positive",
            ));
        }
        if self.max_idle_millis == 0 {
            return Err(FailoverError::invalid_config(
                "max external pool idle millis has to be positive",
            ));
        }
        Ok(())
    }

    fn assemble<P: WeightedPool<T>>(
        self,
        name: String,
        pool: Arc<P>,
    ) -> Result<PartitionSelector<T, P>> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        PartitionSelector::from_parts(
            name,
            pool,
            self.core_partition_size,
            self.max_idle_millis,
            clock,
            RandomSource::from_seed(self.seed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PartitionSelectorBuilder<&'static str> {
        PartitionSelectorBuilder::new()
            .core_partition_size(2)
            .external_pool(Duration::from_secs(1))
    }

    #[test]
    fn requires_partition_size_and_idle_window() {
        let err = PartitionSelectorBuilder::new()
            .external_pool(Duration::from_secs(1))
            .build(["a", "b"], 10)
            .unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(_)));

        let err = PartitionSelectorBuilder::new()
            .core_partition_size(1)
            .build(["a", "b"], 10)
            .unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_partition_larger_than_pool() {
        assert!(base().core_partition_size(3).build(["a", "b"], 10).is_err());
        assert!(base().build(["a", "a"], 10).is_err());
        assert!(base().build(Vec::new(), 10).is_err());
    }

    #[test]
    fn forwards_pool_options() {
        let s = base()
            .name("orders")
            .fail_reduce(10)
            .build(["a", "b", "c"], 10)
            .unwrap();
        assert_eq!(s.name(), "orders");
        assert_eq!(s.pool().name(), "orders");
        let victim = s.partition()[0];
        s.fail(&victim);
        assert_eq!(s.pool().current_weight(&victim), 0);
        assert!(!s.partition().contains(&victim));
    }

    #[test]
    fn invalid_pool_options_surface_as_config_errors() {
        let err = base().fail_reduce_rate(2.0).build(["a", "b"], 10).unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(_)));
    }

    #[test]
    fn sub_millisecond_idle_window_rounds_up() {
        let s = base()
            .external_pool(Duration::from_micros(300))
            .build(["a", "b"], 10)
            .unwrap();
        assert_eq!(s.max_idle_millis, 1);
        assert!(base().external_pool(Duration::ZERO).build(["a", "b"], 10).is_err());
    }

    #[test]
    fn failed_assembly_leaves_callers_pool_open() {
        let pool = WeightFailoverBuilder::new().build(["a", "b"], 10).unwrap();
        let err = base()
            .core_partition_size(3)
            .build_with_pool(pool.clone())
            .unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(_)));
        assert!(!pool.is_closed());
        assert!(base().build_with_pool(pool).is_ok());
    }

    #[test]
    fn layers_over_existing_pool() {
        let pool = WeightFailoverBuilder::new().build(["a", "b", "c"], 10).unwrap();
        let s = base().build_with_pool(pool.clone()).unwrap();
        assert_eq!(s.get_all(), pool.get_all());
        assert_eq!(s.partition().len(), 2);
    }
}
