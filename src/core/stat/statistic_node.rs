use super::{BucketLeapArray, SlidingWindowMetric};
use crate::{
    base::{
        check_validity_for_reuse_statistic, ConcurrencyStat, MetricEvent, ReadStat, StatNode,
        WriteStat, DEFAULT_INTERVAL_MS, DEFAULT_INTERVAL_MS_TOTAL, DEFAULT_SAMPLE_COUNT,
        DEFAULT_SAMPLE_COUNT_TOTAL,
    },
    Result,
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// The window parameters shared by all the statistic nodes of a `NodeStorage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatParams {
    /// bucket count of the resource level global statistic
    pub sample_count_total: u32,
    /// span of the resource level global statistic
    pub interval_ms_total: u32,
    /// bucket count of the readonly metric used by the rule checking
    pub sample_count: u32,
    /// span of the readonly metric used by the rule checking
    pub interval_ms: u32,
}

impl Default for StatParams {
    fn default() -> Self {
        StatParams {
            sample_count_total: DEFAULT_SAMPLE_COUNT_TOTAL,
            interval_ms_total: DEFAULT_INTERVAL_MS_TOTAL,
            sample_count: DEFAULT_SAMPLE_COUNT,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl StatParams {
    pub fn check(&self) -> Result<()> {
        check_validity_for_reuse_statistic(
            self.sample_count,
            self.interval_ms,
            self.sample_count_total,
            self.interval_ms_total,
        )
    }
}

/// StatisticNode holds the real-time statistics of one node:
/// a resource for all callers, a resource through one context, or one caller of a resource.
#[derive(Debug)]
pub struct StatisticNode {
    pub(crate) sample_count: u32,
    pub(crate) interval_ms: u32,
    pub(crate) concurrency: AtomicU32,
    pub(crate) arr: Arc<BucketLeapArray>,
    pub(crate) metric: Arc<SlidingWindowMetric>,
}

impl StatisticNode {
    pub fn new(params: &StatParams) -> Result<Self> {
        let arr = Arc::new(BucketLeapArray::new(
            params.sample_count_total,
            params.interval_ms_total,
        )?);
        let metric = Arc::new(SlidingWindowMetric::new(
            params.sample_count,
            params.interval_ms,
            arr.clone(),
        )?);
        Ok(StatisticNode {
            sample_count: params.sample_count,
            interval_ms: params.interval_ms,
            concurrency: AtomicU32::new(0),
            arr,
            metric,
        })
    }

    pub fn default_metric(&self) -> Arc<dyn ReadStat> {
        self.metric.clone()
    }

    pub fn max_concurrency(&self) -> u32 {
        self.metric.max_concurrency()
    }

    /// total count of `event` over the whole span of the global statistic
    pub fn total_count(&self, event: MetricEvent) -> u64 {
        self.arr.count(event)
    }
}

impl ReadStat for StatisticNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.metric.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.metric.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.metric.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.metric.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.metric.avg_rt()
    }
}

impl WriteStat for StatisticNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.arr.add_count(event, count);
    }

    fn update_concurrency(&self, concurrency: u32) {
        self.arr.update_concurrency(concurrency);
    }
}

impl ConcurrencyStat for StatisticNode {
    fn current_concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::SeqCst)
    }

    fn increase_concurrency(&self) {
        self.arr
            .update_concurrency(self.concurrency.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn decrease_concurrency(&self) {
        // never wraps below zero, even if an exit is not paired with a pass
        let _ = self
            .concurrency
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
    }
}

impl StatNode for StatisticNode {
    fn max_avg(&self, event: MetricEvent) -> f64 {
        self.metric.max_of_single_bucket(event) as f64 * self.sample_count as f64
            / self.interval_ms as f64
            * 1000f64
    }

    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        let stat = SlidingWindowMetric::new(sample_count, interval_ms, self.arr.clone())?;
        Ok(Arc::new(stat))
    }
}
