use std::collections::HashSet;
use std::hash::Hash;

use crate::error::Result;

/// Bound shared by every resource handle managed by a failover.
///
/// Equality is treated as identity: two handles that compare equal are the
/// same backend resource.
pub trait Resource: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> Resource for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// Client-facing acquire/report surface shared by every failover strategy.
pub trait Failover<T: Resource>: Send + Sync {
    /// Every resource known to the failover, healthy or not.
    fn get_all(&self) -> Vec<T>;

    /// Resources that are currently selectable.
    fn get_available(&self) -> Vec<T>;

    /// Up to `n` selectable resources.
    fn get_available_n(&self, n: isize) -> Result<Vec<T>>;

    /// Picks one resource for the next request, or `None` when nothing is
    /// selectable right now. `None` is a normal outcome, not an error.
    fn get_one_available(&self) -> Option<T>;

    fn get_failed(&self) -> HashSet<T>;

    fn success(&self, resource: &T);

    fn fail(&self, resource: &T);

    /// Forces the resource into the unavailable state.
    fn down(&self, resource: &T);

    fn close(&self);
}

/// The weight-tracking pool contract a partition selector is layered on.
///
/// Implementations must be internally thread-safe; every method may be called
/// concurrently from any thread.
pub trait WeightedPool<T: Resource>: Failover<T> {
    /// Live weight of `resource`; `<= 0` means effectively unavailable.
    /// Unknown resources report `0`.
    fn current_weight(&self, resource: &T) -> i32;

    /// The fully-healthy baseline weight of `resource`, if known.
    fn init_weight(&self, resource: &T) -> Option<i32>;

    /// A currently available resource that is not in `exclude`.
    fn get_one_available_exclude(&self, exclude: &HashSet<T>) -> Option<T>;
}
