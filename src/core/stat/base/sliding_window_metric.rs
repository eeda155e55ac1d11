use super::{BucketLeapArray, MetricBucket};
use crate::base::{
    check_validity_for_reuse_statistic, MetricEvent, ReadStat, DEFAULT_STATISTIC_MAX_RT,
};
use crate::utils::curr_time_millis;
use crate::Result;
use std::sync::Arc;

/// A read-only view of a shorter window over the buckets of a `BucketLeapArray`.
///
/// Several views of different lengths may share one array: the node keeps writing to the
/// array, rules read through a view. The view length must divide the array's interval and
/// the view's bucket length must be a multiple of the array's.
#[derive(Debug)]
pub struct SlidingWindowMetric {
    sample_count: u32,
    interval_ms: u32,
    inner: Arc<BucketLeapArray>,
}

impl SlidingWindowMetric {
    pub fn new(sample_count: u32, interval_ms: u32, inner: Arc<BucketLeapArray>) -> Result<Self> {
        check_validity_for_reuse_statistic(
            sample_count,
            interval_ms,
            inner.sample_count(),
            inner.interval_ms(),
        )?;
        Ok(SlidingWindowMetric {
            sample_count,
            interval_ms,
            inner,
        })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.interval_ms / self.sample_count
    }

    /// Start stamps of the inner buckets that fall into the view at `now`, both ends inclusive.
    /// The last one is the bucket covering `now`.
    pub(crate) fn bucket_start_range(&self, now: u64) -> (u64, u64) {
        let last = self.inner.calculate_start_stamp(now);
        let first =
            (last + self.inner.bucket_len_ms() as u64).saturating_sub(self.interval_ms as u64);
        (first, last)
    }

    fn fold_buckets<A, F>(&self, now: u64, init: A, f: F) -> A
    where
        F: Fn(A, &MetricBucket) -> A,
    {
        let (first, last) = self.bucket_start_range(now);
        self.inner
            .get_valid_values_conditional(now, &move |start: u64| first <= start && start <= last)
            .iter()
            .fold(init, |acc, bucket| f(acc, bucket.value()))
    }

    pub fn sum_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.fold_buckets(now, 0, |acc, bucket| acc + bucket.get(event))
    }

    pub fn qps_with_time(&self, now: u64, event: MetricEvent) -> f64 {
        self.sum_with_time(now, event) as f64 * 1000.0 / self.interval_ms as f64
    }

    /// the largest count of `event` in a single bucket of the view
    pub fn max_of_single_bucket(&self, event: MetricEvent) -> u64 {
        self.fold_buckets(curr_time_millis(), 0, |acc, bucket| {
            acc.max(bucket.get(event))
        })
    }

    pub fn max_concurrency(&self) -> u32 {
        self.fold_buckets(curr_time_millis(), 0, |acc, bucket| {
            acc.max(bucket.max_concurrency())
        })
    }
}

impl ReadStat for SlidingWindowMetric {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis(), event)
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        let previous = curr_time_millis().saturating_sub(self.bucket_len_ms() as u64);
        self.qps_with_time(previous, event)
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.sum_with_time(curr_time_millis(), event)
    }

    fn avg_rt(&self) -> f64 {
        let now = curr_time_millis();
        match self.sum_with_time(now, MetricEvent::Complete) {
            0 => 0f64,
            completed => self.sum_with_time(now, MetricEvent::Rt) as f64 / completed as f64,
        }
    }

    fn min_rt(&self) -> f64 {
        self.fold_buckets(curr_time_millis(), DEFAULT_STATISTIC_MAX_RT, |acc, bucket| {
            acc.min(bucket.min_rt())
        }) as f64
    }
}
