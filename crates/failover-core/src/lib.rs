//! Failover primitives
//!
//! - `traits`: the `Failover` acquire/report surface and the `WeightedPool`
//!   contract partition selectors build on
//! - `weight`: `WeightFailover`, a lock-light weighted pool with fail/success
//!   weight adjustment and listeners
//! - `health`: periodic checker that lifts failed resources back into rotation
//! - `builder`: validated configuration for `WeightFailover`

pub mod builder;
pub mod error;
pub mod health;
pub mod traits;
pub mod weight;

pub use builder::*;
pub use error::{FailoverError, Result};
pub use traits::*;
pub use weight::{Checker, Filter, Listener, WeightAdjust, WeightFailover};
