use serde::{Deserialize, Serialize};
use std::time::Duration;

use failover_core::Resource;

use crate::builder::PartitionSelectorBuilder;

/// Weight adjustment as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustConfig {
    Absolute(i32),
    Rate(f64),
}

/// Declarative form of [`PartitionSelectorBuilder`] for the options that
/// are plain data. Listeners, filters and checkers are code and have to be
/// set on the builder returned by [`PartitionConfig::into_builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub core_partition_size: usize,
    pub max_external_pool_idle_millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_add_on_missing: Option<i32>,
    #[serde(default)]
    pub min_weight: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reduce: Option<AdjustConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_increase: Option<AdjustConfig>,
    #[serde(default = "default_check_period_millis")]
    pub check_period_millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_check_period_millis() -> u64 {
    failover_core::DEFAULT_CHECK_PERIOD.as_millis() as u64
}

impl PartitionConfig {
    pub fn new(core_partition_size: usize, max_external_pool_idle_millis: u64) -> Self {
        Self {
            core_partition_size,
            max_external_pool_idle_millis,
            name: None,
            auto_add_on_missing: None,
            min_weight: 0,
            fail_reduce: None,
            success_increase: None,
            check_period_millis: default_check_period_millis(),
            seed: None,
        }
    }

    pub fn into_builder<T: Resource>(self) -> PartitionSelectorBuilder<T> {
        let mut builder = PartitionSelectorBuilder::new()
            .core_partition_size(self.core_partition_size)
            .max_external_pool_idle_millis(self.max_external_pool_idle_millis)
            .min_weight(self.min_weight)
            .check_period(Duration::from_millis(self.check_period_millis));
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(weight) = self.auto_add_on_missing {
            builder = builder.auto_add_on_missing(weight);
        }
        builder = match self.fail_reduce {
            Some(AdjustConfig::Absolute(w)) => builder.fail_reduce(w),
            Some(AdjustConfig::Rate(r)) => builder.fail_reduce_rate(r),
            None => builder,
        };
        builder = match self.success_increase {
            Some(AdjustConfig::Absolute(w)) => builder.success_increase(w),
            Some(AdjustConfig::Rate(r)) => builder.success_increase_rate(r),
            None => builder,
        };
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failover_core::{Failover, FailoverError, WeightedPool};

    #[test]
    fn parses_minimal_json() {
        let cfg: PartitionConfig = serde_json::from_str(
            r#"{ "core_partition_size": 2, "max_external_pool_idle_millis": 500 }"#,
        )
        .unwrap();
        assert_eq!(cfg, PartitionConfig::new(2, 500));
        assert_eq!(cfg.check_period_millis, 1_000);
    }

    #[test]
    fn parses_adjustments_and_builds() {
        let cfg: PartitionConfig = serde_json::from_str(
            r#"{
                "core_partition_size": 2,
                "max_external_pool_idle_millis": 500,
                "name": "search",
                "fail_reduce": { "absolute": 4 },
                "success_increase": { "rate": 0.5 },
                "seed": 9
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.fail_reduce, Some(AdjustConfig::Absolute(4)));
        let s = cfg.into_builder().build(["a", "b", "c"], 8).unwrap();
        assert_eq!(s.name(), "search");
        let member = s.partition()[0];
        s.fail(&member);
        assert_eq!(s.pool().current_weight(&member), 4);
        s.success(&member);
        assert_eq!(s.pool().current_weight(&member), 8);
    }

    #[test]
    fn zero_values_fail_at_build() {
        let err = PartitionConfig::new(0, 500)
            .into_builder()
            .build(["a"], 10)
            .unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(_)));
        assert!(PartitionConfig::new(1, 0)
            .into_builder()
            .build(["a"], 10)
            .is_err());
    }

    #[test]
    fn serializes_without_unset_options() {
        let json = serde_json::to_value(PartitionConfig::new(3, 100)).unwrap();
        assert!(json.get("name").is_none());
        assert_eq!(json["core_partition_size"], 3);
    }
}
