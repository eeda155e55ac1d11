use crate::{
    stat::{LeapArray, MetricTrait},
    Result,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter of a breaker bucket.
/// `target` holds what the strategy watches (slow requests, errors or the sum of response time),
/// `total` holds the number of completed requests.
#[derive(Debug, Default)]
pub struct Counter {
    pub(crate) target: AtomicU64,
    pub(crate) total: AtomicU64,
}

impl MetricTrait for Counter {
    fn reset(&self) {
        self.target.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }
}

pub type CounterLeapArray = LeapArray<Counter>;

impl CounterLeapArray {
    /// record one completed request into the current bucket
    pub fn add_request(&self, target: u64) -> Result<()> {
        let counter = self.current_bucket()?;
        counter.value().target.fetch_add(target, Ordering::SeqCst);
        counter.value().total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// `(target, total)` summed over the valid buckets
    pub fn sum(&self) -> (u64, u64) {
        self.get_current_values()
            .iter()
            .fold((0, 0), |(target, total), c| {
                (
                    target + c.value().target.load(Ordering::SeqCst),
                    total + c.value().total.load(Ordering::SeqCst),
                )
            })
    }
}
