use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{FailoverError, Result};
use crate::traits::Resource;
use crate::weight::{Checker, Filter, Listener, WeightAdjust, WeightFailover, WeightOptions};

pub const DEFAULT_INIT_WEIGHT: i32 = 100;
pub const DEFAULT_FAIL_REDUCE_RATE: f64 = 0.05;
pub const DEFAULT_SUCCESS_INCREASE_RATE: f64 = 0.01;
pub const DEFAULT_RECOVERED_INIT_RATE: f64 = 0.01;
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Fluent configuration for [`WeightFailover`]. Values are validated in
/// `build`, which never produces a partially configured pool.
pub struct WeightFailoverBuilder<T: Resource> {
    name: Option<String>,
    auto_add_on_missing: Option<i32>,
    min_weight: i32,
    fail_reduce: WeightAdjust,
    success_increase: WeightAdjust,
    check_period: Duration,
    recovered_init_rate: Option<f64>,
    filter: Option<Filter<T>>,
    checker: Option<Checker<T>>,
    on_min_weight: Option<Listener<T>>,
    on_recovered: Option<Listener<T>>,
}

impl<T: Resource> Default for WeightFailoverBuilder<T> {
    fn default() -> Self {
        Self {
            name: None,
            auto_add_on_missing: None,
            min_weight: 0,
            fail_reduce: WeightAdjust::Rate(DEFAULT_FAIL_REDUCE_RATE),
            success_increase: WeightAdjust::Rate(DEFAULT_SUCCESS_INCREASE_RATE),
            check_period: DEFAULT_CHECK_PERIOD,
            recovered_init_rate: None,
            filter: None,
            checker: None,
            on_min_weight: None,
            on_recovered: None,
        }
    }
}

impl<T: Resource> WeightFailoverBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Registers resources first seen in a success/fail/down report with
    /// `weight` instead of ignoring them.
    pub fn auto_add_on_missing(mut self, weight: i32) -> Self {
        self.auto_add_on_missing = Some(weight);
        self
    }

    pub fn min_weight(mut self, weight: i32) -> Self {
        self.min_weight = weight;
        self
    }

    pub fn fail_reduce(mut self, weight: i32) -> Self {
        self.fail_reduce = WeightAdjust::Absolute(weight);
        self
    }

    pub fn fail_reduce_rate(mut self, rate: f64) -> Self {
        self.fail_reduce = WeightAdjust::Rate(rate);
        self
    }

    pub fn success_increase(mut self, weight: i32) -> Self {
        self.success_increase = WeightAdjust::Absolute(weight);
        self
    }

    pub fn success_increase_rate(mut self, rate: f64) -> Self {
        self.success_increase = WeightAdjust::Rate(rate);
        self
    }

    pub fn check_period(mut self, period: Duration) -> Self {
        self.check_period = period;
        self
    }

    /// Only resources accepted by `filter` are ever selected.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Health checker returning the rate of the baseline weight a failed
    /// resource should recover to; `<= 0` keeps it down.
    pub fn checker<F>(mut self, checker: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        self.checker = Some(Arc::new(checker));
        self.recovered_init_rate = None;
        self
    }

    /// Boolean health checker; a passing resource recovers to
    /// `recovered_init_rate` of its baseline weight.
    pub fn bool_checker<F>(mut self, checker: F, recovered_init_rate: f64) -> Self
    where
        F: Fn(&T) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.checker = Some(Arc::new(move |resource: &T| {
            Ok(if checker(resource)? { recovered_init_rate } else { 0.0 })
        }));
        self.recovered_init_rate = Some(recovered_init_rate);
        self
    }

    pub fn on_min_weight<F>(mut self, listener: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_min_weight = Some(Arc::new(listener));
        self
    }

    pub fn on_recovered<F>(mut self, listener: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_recovered = Some(Arc::new(listener));
        self
    }

    /// Builds a pool where every resource starts at `init_weight`.
    pub fn build<I>(self, resources: I, init_weight: i32) -> Result<Arc<WeightFailover<T>>>
    where
        I: IntoIterator<Item = T>,
    {
        self.build_weighted(resources.into_iter().map(|r| (r, init_weight)))
    }

    pub fn build_default<I>(self, resources: I) -> Result<Arc<WeightFailover<T>>>
    where
        I: IntoIterator<Item = T>,
    {
        self.build(resources, DEFAULT_INIT_WEIGHT)
    }

    pub fn build_weighted<I>(self, resources: I) -> Result<Arc<WeightFailover<T>>>
    where
        I: IntoIterator<Item = (T, i32)>,
    {
        let resources: Vec<(T, i32)> = resources.into_iter().collect();
        self.validate(&resources)?;

        let options = WeightOptions {
            name: self.name.unwrap_or_else(|| "failover".to_string()),
            auto_add_on_missing: self.auto_add_on_missing,
            min_weight: self.min_weight,
            fail_reduce: self.fail_reduce,
            success_increase: self.success_increase,
            check_period: self.check_period,
            filter: self.filter,
            checker: self.checker,
            on_min_weight: self.on_min_weight,
            on_recovered: self.on_recovered,
        };
        let pool = Arc::new(WeightFailover::new(options, resources));
        WeightFailover::start_health_task(&pool);
        info!(
            "[{}] weight failover created with {} resources",
            pool.name(),
            pool.len()
        );
        Ok(pool)
    }

    fn validate(&self, resources: &[(T, i32)]) -> Result<()> {
        if resources.is_empty() {
            return Err(FailoverError::invalid_config("resources must not be empty"));
        }
        if self.min_weight < 0 {
            return Err(FailoverError::invalid_config("min weight has to be non-negative"));
        }
        if let Some((_, weight)) = resources.iter().find(|(_, w)| *w <= self.min_weight) {
            return Err(FailoverError::invalid_config(format!(
                "init weight {} must exceed min weight {}",
                weight, self.min_weight
            )));
        }
        if let Some(weight) = self.auto_add_on_missing {
            if weight <= self.min_weight {
                return Err(FailoverError::invalid_config(
                    "auto add weight must exceed min weight",
                ));
            }
        }
        check_adjust("fail reduce", self.fail_reduce)?;
        check_adjust("success increase", self.success_increase)?;
        if self.check_period.is_zero() {
            return Err(FailoverError::invalid_config("check period has to be positive"));
        }
        if let Some(rate) = self.recovered_init_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(FailoverError::invalid_config(
                    "recovered init rate must be in (0, 1]",
                ));
            }
        }
        Ok(())
    }
}

fn check_adjust(what: &str, adjust: WeightAdjust) -> Result<()> {
    match adjust {
        WeightAdjust::Absolute(w) if w <= 0 => Err(FailoverError::invalid_config(format!(
            "{} weight has to be positive",
            what
        ))),
        WeightAdjust::Rate(r) if !(r > 0.0 && r <= 1.0) => Err(FailoverError::invalid_config(
            format!("{} rate must be in (0, 1]", what),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Failover, WeightedPool};

    #[test]
    fn rejects_empty_resources() {
        let err = WeightFailoverBuilder::<&str>::new()
            .build(Vec::new(), 10)
            .unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_weights_and_rates() {
        assert!(WeightFailoverBuilder::new().build(["a"], 0).is_err());
        assert!(WeightFailoverBuilder::new().min_weight(-1).build(["a"], 10).is_err());
        assert!(WeightFailoverBuilder::new().min_weight(10).build(["a"], 10).is_err());
        assert!(WeightFailoverBuilder::new().fail_reduce(0).build(["a"], 10).is_err());
        assert!(WeightFailoverBuilder::new().fail_reduce_rate(1.5).build(["a"], 10).is_err());
        assert!(WeightFailoverBuilder::new()
            .success_increase_rate(0.0)
            .build(["a"], 10)
            .is_err());
        assert!(WeightFailoverBuilder::new()
            .check_period(Duration::ZERO)
            .build(["a"], 10)
            .is_err());
        assert!(WeightFailoverBuilder::new()
            .bool_checker(|_: &&str| Ok(true), 0.0)
            .build(["a"], 10)
            .is_err());
    }

    #[test]
    fn defaults_use_rate_adjustments() {
        let p = WeightFailoverBuilder::new().build_default(["a", "b"]).unwrap();
        assert_eq!(p.name(), "failover");
        assert_eq!(p.init_weight(&"a"), Some(DEFAULT_INIT_WEIGHT));
        p.fail(&"a");
        assert_eq!(p.current_weight(&"a"), 95);
        p.success(&"a");
        assert_eq!(p.current_weight(&"a"), 96);
    }

    #[test]
    fn duplicate_resources_are_collapsed() {
        let p = WeightFailoverBuilder::new()
            .build_weighted([("a", 10), ("a", 20), ("b", 5)])
            .unwrap();
        assert_eq!(p.get_all(), vec!["a", "b"]);
        assert_eq!(p.init_weight(&"a"), Some(10));
    }
}
