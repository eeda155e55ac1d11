use crate::base::{MetricEvent, DEFAULT_STATISTIC_MAX_RT};
use enum_map::EnumMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// The value type of the buckets of a `LeapArray`.
/// A bucket is read and written by many threads at once through `Arc`.
pub trait MetricTrait: fmt::Debug + Default + Send + Sync {
    /// zero the bucket in place
    fn reset(&self);
}

/// MetricBucket holds the counters of one time slice of a resource.
#[derive(Debug)]
pub struct MetricBucket {
    counter: EnumMap<MetricEvent, AtomicU64>,
    min_rt: AtomicU64,
    max_concurrency: AtomicU32,
}

impl Default for MetricBucket {
    fn default() -> Self {
        MetricBucket {
            counter: EnumMap::default(),
            min_rt: AtomicU64::new(DEFAULT_STATISTIC_MAX_RT),
            max_concurrency: AtomicU32::new(0),
        }
    }
}

impl MetricTrait for MetricBucket {
    fn reset(&self) {
        self.counter
            .values()
            .for_each(|count| count.store(0, Ordering::SeqCst));
        self.min_rt.store(DEFAULT_STATISTIC_MAX_RT, Ordering::SeqCst);
        self.max_concurrency.store(0, Ordering::SeqCst);
    }
}

impl MetricBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// `MetricEvent::Rt` accumulates the round trip and also lowers the minimum
    pub fn add(&self, event: MetricEvent, count: u64) {
        if event == MetricEvent::Rt {
            self.add_rt(count);
        } else {
            self.add_count(event, count);
        }
    }

    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.counter[event].fetch_add(count, Ordering::SeqCst);
    }

    pub fn add_rt(&self, round_trip: u64) {
        self.counter[MetricEvent::Rt].fetch_add(round_trip, Ordering::SeqCst);
        self.min_rt.fetch_min(round_trip, Ordering::SeqCst);
    }

    pub fn get(&self, event: MetricEvent) -> u64 {
        self.counter[event].load(Ordering::SeqCst)
    }

    pub fn min_rt(&self) -> u64 {
        self.min_rt.load(Ordering::SeqCst)
    }

    /// keep the peak of the concurrency seen in this slice
    pub fn update_concurrency(&self, concurrency: u32) {
        self.max_concurrency.fetch_max(concurrency, Ordering::SeqCst);
    }

    pub fn max_concurrency(&self) -> u32 {
        self.max_concurrency.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn events_are_independent() {
        let bucket = MetricBucket::new();
        bucket.add(MetricEvent::Pass, 3);
        bucket.add(MetricEvent::Block, 1);
        bucket.add(MetricEvent::Rt, 40);
        bucket.add(MetricEvent::Rt, 25);
        bucket.add(MetricEvent::Complete, 2);
        assert_eq!(3, bucket.get(MetricEvent::Pass));
        assert_eq!(1, bucket.get(MetricEvent::Block));
        assert_eq!(2, bucket.get(MetricEvent::Complete));
        assert_eq!(0, bucket.get(MetricEvent::Error));
        assert_eq!(65, bucket.get(MetricEvent::Rt));
        assert_eq!(25, bucket.min_rt());
    }

    #[test]
    fn concurrent_writers() {
        let bucket = Arc::new(MetricBucket::new());
        let handles: Vec<_> = (1..=200u64)
            .map(|i| {
                let bucket = bucket.clone();
                thread::spawn(move || {
                    bucket.add(MetricEvent::Pass, 1);
                    bucket.add(MetricEvent::Error, 2);
                    bucket.add_rt(i);
                    bucket.update_concurrency(i as u32);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(200, bucket.get(MetricEvent::Pass));
        assert_eq!(400, bucket.get(MetricEvent::Error));
        assert_eq!(20100, bucket.get(MetricEvent::Rt));
        assert_eq!(1, bucket.min_rt());
        assert_eq!(200, bucket.max_concurrency());
    }

    #[test]
    fn reset() {
        let bucket = MetricBucket::new();
        bucket.add(MetricEvent::Pass, 5);
        bucket.add_rt(10);
        bucket.update_concurrency(7);
        bucket.reset();
        assert_eq!(0, bucket.get(MetricEvent::Pass));
        assert_eq!(0, bucket.get(MetricEvent::Rt));
        assert_eq!(DEFAULT_STATISTIC_MAX_RT, bucket.min_rt());
        assert_eq!(0, bucket.max_concurrency());
    }
}
