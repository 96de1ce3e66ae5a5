use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::{Failover, Resource, WeightedPool};

pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type Checker<T> = Arc<dyn Fn(&T) -> anyhow::Result<f64> + Send + Sync>;
pub type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// How much a single success or failure moves a resource's weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightAdjust {
    Absolute(i32),
    /// Fraction of the resource's baseline weight, rounded up, at least 1.
    Rate(f64),
}

impl WeightAdjust {
    pub fn amount(&self, init: i32) -> i32 {
        match *self {
            Self::Absolute(w) => w,
            Self::Rate(rate) => ((init as f64) * rate).ceil().max(1.0) as i32,
        }
    }
}

pub(crate) struct WeightOptions<T> {
    pub name: String,
    pub auto_add_on_missing: Option<i32>,
    pub min_weight: i32,
    pub fail_reduce: WeightAdjust,
    pub success_increase: WeightAdjust,
    pub check_period: Duration,
    pub filter: Option<Filter<T>>,
    pub checker: Option<Checker<T>>,
    pub on_min_weight: Option<Listener<T>>,
    pub on_recovered: Option<Listener<T>>,
}

#[derive(Debug)]
pub(crate) struct WeightState {
    pub init: i32,
    pub current: AtomicI32,
}

impl WeightState {
    fn new(init: i32) -> Self {
        Self {
            init,
            current: AtomicI32::new(init),
        }
    }

    /// Applies `f` atomically and returns `(previous, next)`.
    pub fn update(&self, f: impl Fn(i32) -> i32) -> (i32, i32) {
        let prev = match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| Some(f(w)))
        {
            Ok(w) | Err(w) => w,
        };
        (prev, f(prev))
    }
}

/// Thread-safe weighted resource pool.
///
/// Every resource carries a baseline weight and a live weight. Failures pull
/// the live weight down towards `min_weight`, successes push it back up to the
/// baseline, and a periodic checker lifts failed resources back into rotation.
/// Selection is weighted-random over the live weights.
pub struct WeightFailover<T: Resource> {
    pub(crate) options: WeightOptions<T>,
    pub(crate) order: RwLock<Vec<T>>,
    pub(crate) weights: DashMap<T, Arc<WeightState>>,
    pub(crate) health_task: Mutex<Option<JoinHandle<()>>>,
    pub(crate) closed: AtomicBool,
}

impl<T: Resource> WeightFailover<T> {
    pub(crate) fn new(options: WeightOptions<T>, resources: Vec<(T, i32)>) -> Self {
        let weights = DashMap::with_capacity(resources.len());
        let mut order = Vec::with_capacity(resources.len());
        for (resource, weight) in resources {
            if weights.contains_key(&resource) {
                continue;
            }
            weights.insert(resource.clone(), Arc::new(WeightState::new(weight)));
            order.push(resource);
        }
        Self {
            options,
            order: RwLock::new(order),
            weights,
            health_task: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn min_weight(&self) -> i32 {
        self.options.min_weight
    }

    pub(crate) fn state(&self, resource: &T) -> Option<Arc<WeightState>> {
        self.weights.get(resource).map(|s| Arc::clone(s.value()))
    }

    /// Looks up a resource's state, registering it first when
    /// `auto_add_on_missing` is configured.
    fn state_or_add(&self, resource: &T) -> Option<Arc<WeightState>> {
        if let Some(state) = self.state(resource) {
            return Some(state);
        }
        let weight = self.options.auto_add_on_missing?;
        let mut order = self.order.write();
        let state = self
            .weights
            .entry(resource.clone())
            .or_insert_with(|| {
                order.push(resource.clone());
                Arc::new(WeightState::new(weight))
            })
            .value()
            .clone();
        debug!(
            "[{}] auto-added missing resource with weight {}",
            self.options.name, weight
        );
        Some(state)
    }

    fn passes_filter(&self, resource: &T) -> bool {
        self.options.filter.as_ref().map_or(true, |f| f(resource))
    }

    /// Available resources with their live weight, in universe order.
    ///
    /// The filter runs after the order lock is released, so it may call back
    /// into the pool.
    fn candidates(&self, exclude: Option<&HashSet<T>>) -> Vec<(T, i32)> {
        let positive: Vec<(T, i32)> = {
            let order = self.order.read();
            order
                .iter()
                .filter(|r| exclude.map_or(true, |ex| !ex.contains(*r)))
                .filter_map(|r| {
                    let weight = self.weights.get(r)?.current.load(Ordering::Acquire);
                    (weight > 0).then(|| (r.clone(), weight))
                })
                .collect()
        };
        positive
            .into_iter()
            .filter(|(r, _)| self.passes_filter(r))
            .collect()
    }

    fn pick_weighted(candidates: &[(T, i32)]) -> Option<usize> {
        let total: i64 = candidates.iter().map(|(_, w)| i64::from(*w)).sum();
        if total <= 0 {
            return None;
        }
        let draw = rand::rng().random_range(0..total);
        let mut acc = 0i64;
        for (idx, (_, weight)) in candidates.iter().enumerate() {
            acc += i64::from(*weight);
            if draw < acc {
                return Some(idx);
            }
        }
        Some(0)
    }

    fn reached_min_weight(&self, resource: &T) {
        warn!("[{}] resource reached min weight", self.options.name);
        if let Some(listener) = &self.options.on_min_weight {
            listener(resource);
        }
    }

    pub(crate) fn recovered(&self, resource: &T) {
        info!("[{}] resource recovered", self.options.name);
        if let Some(listener) = &self.options.on_recovered {
            listener(resource);
        }
    }
}

impl<T: Resource> Failover<T> for WeightFailover<T> {
    fn get_all(&self) -> Vec<T> {
        self.order.read().clone()
    }

    fn get_available(&self) -> Vec<T> {
        self.candidates(None).into_iter().map(|(r, _)| r).collect()
    }

    fn get_available_n(&self, n: isize) -> Result<Vec<T>> {
        if n <= 0 {
            return Ok(Vec::new());
        }
        let mut candidates = self.candidates(None);
        let mut picked = Vec::with_capacity((n as usize).min(candidates.len()));
        while picked.len() < n as usize {
            let Some(idx) = Self::pick_weighted(&candidates) else {
                break;
            };
            picked.push(candidates.swap_remove(idx).0);
        }
        Ok(picked)
    }

    fn get_one_available(&self) -> Option<T> {
        let candidates = self.candidates(None);
        Self::pick_weighted(&candidates).map(|idx| candidates[idx].0.clone())
    }

    fn get_failed(&self) -> HashSet<T> {
        let min = self.options.min_weight;
        self.order
            .read()
            .iter()
            .filter(|r| {
                self.weights
                    .get(*r)
                    .map_or(false, |s| s.current.load(Ordering::Acquire) <= min)
            })
            .cloned()
            .collect()
    }

    fn success(&self, resource: &T) {
        let Some(state) = self.state_or_add(resource) else {
            debug!("[{}] success reported for unknown resource", self.options.name);
            return;
        };
        let increase = self.options.success_increase.amount(state.init);
        let init = state.init;
        state.update(|w| if w >= init { w } else { w.saturating_add(increase).min(init) });
    }

    fn fail(&self, resource: &T) {
        let Some(state) = self.state_or_add(resource) else {
            debug!("[{}] failure reported for unknown resource", self.options.name);
            return;
        };
        let reduce = self.options.fail_reduce.amount(state.init);
        let min = self.options.min_weight;
        let (prev, next) =
            state.update(|w| if w <= min { w } else { w.saturating_sub(reduce).max(min) });
        if prev > min && next <= min {
            self.reached_min_weight(resource);
        }
    }

    fn down(&self, resource: &T) {
        let Some(state) = self.state_or_add(resource) else {
            debug!("[{}] down reported for unknown resource", self.options.name);
            return;
        };
        let min = self.options.min_weight;
        let (prev, _) = state.update(|w| w.min(min));
        if prev > min {
            self.reached_min_weight(resource);
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.health_task.lock().take() {
            task.abort();
        }
        info!("[{}] weight failover closed", self.options.name);
    }
}

impl<T: Resource> WeightedPool<T> for WeightFailover<T> {
    fn current_weight(&self, resource: &T) -> i32 {
        self.state(resource)
            .map_or(0, |s| s.current.load(Ordering::Acquire))
    }

    fn init_weight(&self, resource: &T) -> Option<i32> {
        self.state(resource).map(|s| s.init)
    }

    fn get_one_available_exclude(&self, exclude: &HashSet<T>) -> Option<T> {
        let candidates = self.candidates(Some(exclude));
        Self::pick_weighted(&candidates).map(|idx| candidates[idx].0.clone())
    }
}

impl<T: Resource> Drop for WeightFailover<T> {
    fn drop(&mut self) {
        if let Some(task) = self.health_task.get_mut().take() {
            task.abort();
        }
    }
}

impl<T: Resource> fmt::Debug for WeightFailover<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightFailover")
            .field("name", &self.options.name)
            .field("resources", &self.len())
            .field("min_weight", &self.options.min_weight)
            .field("closed", &self.is_closed())
            .finish()
    }
}
