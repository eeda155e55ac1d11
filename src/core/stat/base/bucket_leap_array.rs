use super::{LeapArray, MetricBucket};
use crate::base::{MetricEvent, WriteStat, DEFAULT_STATISTIC_MAX_RT};
use crate::logging;
use crate::utils::curr_time_millis;
use crate::Result;
use std::cmp;

/// a specialization of `LeapArray<T>` with `MetricBucket`
pub type BucketLeapArray = LeapArray<MetricBucket>;

impl WriteStat for BucketLeapArray {
    fn add_count(&self, event: MetricEvent, count: u64) {
        if let Err(err) = self.add_count_with_time(curr_time_millis(), event, count) {
            logging::FREQUENT_ERROR_ONCE.call_once(|| {
                logging::error!(
                    "[BucketLeapArray::add_count] Fail to record {:?}, error: {:?}",
                    event,
                    err
                );
            });
        }
    }

    fn update_concurrency(&self, concurrency: u32) {
        if let Err(err) = self.update_concurrency_with_time(curr_time_millis(), concurrency) {
            logging::FREQUENT_ERROR_ONCE.call_once(|| {
                logging::error!(
                    "[BucketLeapArray::update_concurrency] Fail to record concurrency, error: {:?}",
                    err
                );
            });
        }
    }
}

impl BucketLeapArray {
    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) -> Result<()> {
        self.get_bucket_of_time(now)?.value().add(event, count);
        Ok(())
    }

    pub fn update_concurrency_with_time(&self, now: u64, concurrency: u32) -> Result<()> {
        self.get_bucket_of_time(now)?
            .value()
            .update_concurrency(concurrency);
        Ok(())
    }

    /// count of `event` over the whole interval
    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.get_valid_values(now)
            .iter()
            .map(|bucket| bucket.value().get(event))
            .sum()
    }

    pub fn min_rt(&self) -> u64 {
        self.get_current_values()
            .iter()
            .map(|bucket| bucket.value().min_rt())
            .fold(DEFAULT_STATISTIC_MAX_RT, cmp::min)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.get_current_values()
            .iter()
            .map(|bucket| bucket.value().max_concurrency())
            .max()
            .unwrap_or_default()
    }
}
