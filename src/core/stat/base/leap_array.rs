use super::MetricTrait;
use crate::utils::curr_time_millis;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use std::sync::Arc;

/// predicate on the start timestamp of a bucket
pub type TimePredicate = dyn Fn(u64) -> bool;

/// BucketWrap represent a slot to record metrics
/// The metric itself should be atomic
/// The length of BucketWrap could be seen in LeapArray.
/// The scope of time is [start_stamp, start_stamp+bucket_length)
/// A bucket never changes its start timestamp, a stale bucket is replaced as a whole.
#[derive(Debug, Default)]
pub struct BucketWrap<T: MetricTrait> {
    // The start timestamp of this statistic bucket wrapper.
    start_stamp: u64,
    // The actual data structure to record the metrics (e.g. MetricBucket).
    value: T,
}

impl<T: MetricTrait> BucketWrap<T> {
    pub fn new(start_stamp: u64) -> Self {
        BucketWrap {
            start_stamp,
            value: T::default(),
        }
    }

    pub fn start_stamp(&self) -> u64 {
        self.start_stamp
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn is_time_in_bucket(&self, now: u64, bucket_len_ms: u32) -> bool {
        self.start_stamp <= now && now < self.start_stamp + (bucket_len_ms as u64)
    }

    pub fn is_deprecated(&self, now: u64, interval: u64) -> bool {
        now > self.start_stamp && now - self.start_stamp > interval
    }
}

/// The BucketWrap leap array,
/// it treats the inner array as a ring
/// sample_count represent the number of BucketWrap
/// interval_ms represent the interval of LeapArray.
/// For example, bucket_len_ms is 200ms, interval_ms is 1000ms, so sample_count is 5.
/// A deprecated bucket is replaced by a fresh one with a compare-and-swap on its cell,
/// the threads losing the race reload the cell and record into the winner's bucket.
#[derive(Debug)]
pub struct LeapArray<T: MetricTrait> {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    pub(crate) array: Vec<ArcSwap<BucketWrap<T>>>,
}

impl<T: MetricTrait> LeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        if sample_count == 0 || interval_ms == 0 || interval_ms % sample_count != 0 {
            return Err(Error::msg(
                "Invalid sample count or interval_ms. Time span needs to be evenly divided",
            ));
        }
        let array = (0..sample_count)
            .map(|_| ArcSwap::from_pointee(BucketWrap::default()))
            .collect();
        Ok(LeapArray {
            bucket_len_ms: interval_ms / sample_count,
            sample_count,
            interval_ms,
            array,
        })
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn current_bucket(&self) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time(curr_time_millis())
    }

    pub fn get_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let target_start = self.calculate_start_stamp(now);
        let cell = &self.array[idx];
        /*
        Get bucket item at given time from the array.
        - (1) Bucket is up-to-date, then just return the bucket.
        - (2) Bucket is deprecated (or has never been used), then build a fresh bucket
              and CAS it into the ring. Whoever loses the CAS reloads the cell.
        - (3) Bucket is ahead of the given time, the clock has moved backwards.
        */
        loop {
            let bucket = cell.load_full();
            if bucket.start_stamp() == target_start {
                /*
                    B0       B1      B2     B3      B4
                ||_______|_______|_______|_______|_______||___
                200     400     600     800     1000    1200  timestamp
                                            ^
                                         time=888
                           startTime of Bucket 3: 800, so it's up-to-date
                */
                return Ok(bucket);
            } else if target_start > bucket.start_stamp() {
                /*
                  (old)
                            B0       B1      B2    NULL      B4
                |_______||_______|_______|_______|_______|_______||___
                ...    1200     1400    1600    1800    2000    2200  timestamp
                                             ^
                                          time=1676
                         startTime of Bucket 2: 400, deprecated, should be replaced
                */
                let fresh = Arc::new(BucketWrap::new(target_start));
                let prev = cell.compare_and_swap(&bucket, Arc::clone(&fresh));
                if Arc::ptr_eq(&*prev, &bucket) {
                    return Ok(fresh);
                }
                // another thread has replaced the bucket, reload it
            } else {
                return Err(Error::msg("invalid time stamp, cannot find bucket"));
            }
        }
    }

    /// Get the previous bucket item for current timestamp.
    pub fn get_previous_bucket(&self) -> Result<Arc<BucketWrap<T>>> {
        let now = curr_time_millis();
        let previous = now.saturating_sub(self.bucket_len_ms as u64);
        let idx = self.time2idx(previous) as usize;
        let bucket = self.array[idx].load_full();
        if bucket.is_deprecated(now, self.interval_ms as u64) {
            return Err(Error::msg("previous bucket has been deprecated"));
        }
        if bucket.start_stamp() + (self.bucket_len_ms as u64) < previous {
            return Err(Error::msg("the timestamp of returnning bucket is wrong"));
        }
        Ok(bucket)
    }

    /// compute the start timestamp of current bucket
    pub(crate) fn calculate_start_stamp(&self, now: u64) -> u64 {
        now - now % (self.bucket_len_ms as u64)
    }

    pub(crate) fn time2idx(&self, now: u64) -> u64 {
        let idx = now / (self.bucket_len_ms as u64);
        idx % (self.sample_count as u64)
    }

    pub fn is_bucket_deprecated(&self, now: u64, bucket: &BucketWrap<T>) -> bool {
        bucket.is_deprecated(now, self.interval_ms as u64)
    }

    pub fn get_bucket_value(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let bucket = self.array[idx].load_full();
        if bucket.is_time_in_bucket(now, self.bucket_len_ms) {
            Ok(bucket)
        } else {
            Err(Error::msg("invalid time, cannot get value in the bucket"))
        }
    }

    pub fn get_current_values(&self) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values(curr_time_millis())
    }

    ///  Get all BucketWrap between [current time - leap array interval, current time]
    pub fn get_valid_values(&self, now: u64) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values_conditional(now, &|_| true)
    }

    pub fn get_valid_values_conditional(
        &self,
        now: u64,
        condition: &TimePredicate,
    ) -> Vec<Arc<BucketWrap<T>>> {
        let mut res = Vec::with_capacity(self.array.len());
        for cell in &self.array {
            let bucket = cell.load_full();
            // the never used buckets and the buckets from the future are skipped
            if bucket.start_stamp() > 0
                && bucket.start_stamp() <= now
                && !self.is_bucket_deprecated(now, &bucket)
                && condition(bucket.start_stamp())
            {
                res.push(bucket);
            }
        }
        res
    }

    /// reset the values of all the buckets in place
    pub fn reset(&self) {
        for cell in &self.array {
            cell.load().value().reset();
        }
    }
}
