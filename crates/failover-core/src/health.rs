use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::traits::{Failover, Resource};
use crate::weight::WeightFailover;

impl<T: Resource> WeightFailover<T> {
    /// Runs the configured checker once against every failed resource.
    ///
    /// A positive rate lifts the resource to `ceil(init * rate)` (at least one
    /// above `min_weight`, at most its baseline). Checker errors and
    /// non-positive rates leave the weight untouched. Returns how many
    /// resources came back into rotation.
    pub fn run_health_check(&self) -> usize {
        let Some(checker) = self.options.checker.as_ref() else {
            return 0;
        };
        let min = self.options.min_weight;
        let mut recovered = 0;
        for resource in self.get_failed() {
            let rate = match checker(&resource) {
                Ok(rate) => rate,
                Err(e) => {
                    debug!("[{}] health check failed: {:#}", self.options.name, e);
                    continue;
                }
            };
            if !(rate > 0.0) {
                continue;
            }
            let Some(state) = self.state(&resource) else {
                continue;
            };
            let target = (((state.init as f64) * rate).ceil() as i32)
                .max(min.saturating_add(1))
                .min(state.init);
            let prev = state.current.fetch_max(target, Ordering::AcqRel);
            if prev <= min && target > min {
                recovered += 1;
                self.recovered(&resource);
            }
        }
        recovered
    }

    /// Schedules `run_health_check` every check period on the ambient tokio
    /// runtime. Without a runtime the checks must be driven by the caller.
    pub(crate) fn start_health_task(pool: &Arc<Self>) {
        if pool.options.checker.is_none() {
            return;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    "[{}] no tokio runtime available, periodic health checks disabled",
                    pool.options.name
                );
                return;
            }
        };
        let weak = Arc::downgrade(pool);
        let period = pool.options.check_period;
        let name = pool.options.name.clone();
        let task = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else {
                    break;
                };
                if pool.is_closed() {
                    break;
                }
                match tokio::task::spawn_blocking(move || pool.run_health_check()).await {
                    Ok(0) => {}
                    Ok(n) => debug!("[{}] health check recovered {} resources", name, n),
                    Err(e) => warn!("[{}] health check task failed: {}", name, e),
                }
            }
            debug!("[{}] health check loop stopped", name);
        });
        *pool.health_task.lock() = Some(task);
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::WeightFailoverBuilder;
    use crate::traits::{Failover, WeightedPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn checker_recovers_failed_resources() {
        let recovered = Arc::new(AtomicUsize::new(0));
        let r = recovered.clone();
        let p = WeightFailoverBuilder::new()
            .checker(|res: &&str| Ok(if *res == "a" { 0.5 } else { 0.0 }))
            .on_recovered(move |_: &&str| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .build(["a", "b", "c"], 10)
            .unwrap();
        p.down(&"a");
        p.down(&"b");

        assert_eq!(p.run_health_check(), 1);
        assert_eq!(p.current_weight(&"a"), 5);
        assert_eq!(p.current_weight(&"b"), 0);
        assert_eq!(recovered.load(Ordering::SeqCst), 1);
        // already recovered, nothing more to do
        assert_eq!(p.run_health_check(), 0);
    }

    #[test]
    fn checker_errors_are_swallowed() {
        let p = WeightFailoverBuilder::new()
            .checker(|_: &&str| Err(anyhow::anyhow!("connection refused")))
            .build(["a"], 10)
            .unwrap();
        p.down(&"a");
        assert_eq!(p.run_health_check(), 0);
        assert_eq!(p.current_weight(&"a"), 0);
    }

    #[test]
    fn bool_checker_uses_recovered_init_rate() {
        let p = WeightFailoverBuilder::new()
            .bool_checker(|_: &&str| Ok(true), 0.01)
            .build(["a"], 100)
            .unwrap();
        p.down(&"a");
        assert_eq!(p.run_health_check(), 1);
        assert_eq!(p.current_weight(&"a"), 1);
    }

    #[test]
    fn recovery_stays_above_min_weight() {
        let p = WeightFailoverBuilder::new()
            .min_weight(3)
            .bool_checker(|_: &&str| Ok(true), 0.01)
            .build(["a"], 100)
            .unwrap();
        p.down(&"a");
        assert_eq!(p.current_weight(&"a"), 3);
        p.run_health_check();
        assert_eq!(p.current_weight(&"a"), 4);
    }

    #[tokio::test]
    async fn background_task_recovers_and_stops_on_close() {
        let p = WeightFailoverBuilder::new()
            .check_period(Duration::from_millis(10))
            .bool_checker(|_: &&str| Ok(true), 1.0)
            .build(["a", "b"], 10)
            .unwrap();
        p.down(&"a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(p.current_weight(&"a"), 10);

        p.close();
        assert!(p.health_task.lock().is_none());
        p.down(&"b");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(p.current_weight(&"b"), 0);
    }
}
