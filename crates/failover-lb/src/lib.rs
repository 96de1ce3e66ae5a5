//! Partitioned failover load balancing
//!
//! Provides:
//! - `PartitionSelector`: keeps a fixed-size active subset of a weighted pool
//!   and hands out one member per request
//! - Selection algorithms (recency reuse for idle partitions, weighted-random
//!   roulette scored by live weight and in-flight calls)
//! - Self-healing replacement of members that fail or go down
//! - Builder and serde config, prometheus counters

pub mod algorithms;
pub mod builder;
pub mod clock;
pub mod config;
pub mod failover;
pub mod metrics;
pub mod partition;
pub mod types;

pub use algorithms::{RandomSource, Selection};
pub use builder::*;
pub use clock::*;
pub use config::*;
pub use metrics::*;
pub use partition::*;
pub use types::*;

pub use failover_core::{Failover, FailoverError, Resource, WeightFailover, WeightedPool};
