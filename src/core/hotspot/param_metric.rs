use super::*;
use crate::base::ParamKey;
use std::cmp::min;
use std::sync::{atomic::AtomicU64, Arc};

pub const CONCURRENCY_MAX_COUNT: usize = 4000;
pub const PARAMS_CAPACITY_BASE: usize = 4000;
pub const PARAMS_MAX_CAPACITY: usize = 20000;

/// the key of the aggregated statistics of the values which did not fit into the counters
pub const OTHERS_KEY: &str = "$others";

/// ParamCell tells where the statistics of a parameter value are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamCell {
    /// the value owns an entry of the counters
    Value(ParamKey),
    /// the value shares the "others" entry
    Others,
}

impl ParamCell {
    pub fn key(&self) -> ParamKey {
        match self {
            ParamCell::Value(key) => key.clone(),
            ParamCell::Others => OTHERS_KEY.into(),
        }
    }

    pub fn is_others(&self) -> bool {
        matches!(self, ParamCell::Others)
    }
}

/// `ParamsMetric` carries real-time counters for frequent ("hot spot") parameters.
/// For each counter, the key is the parameter value, while the value is the statistic.
/// The memory is bounded by the capacity of the counters: once a counter is full,
/// a new value takes the place of the least recent one only if that one is idle,
/// otherwise the new value is counted in the shared "others" entry.
#[derive(Debug, Default)]
pub struct ParamsMetric {
    /// rule_time_counter records the last added token timestamp.
    pub(crate) rule_time_counter: Counter,
    /// rule_token_counter records the number of tokens.
    pub(crate) rule_token_counter: Counter,
    /// concurrency_counter records the real-time concurrency.
    pub(crate) concurrency_counter: Counter,
    pub(crate) others_time_counter: Counter,
    pub(crate) others_token_counter: Counter,
    pub(crate) others_concurrency_counter: Counter,
}

impl ParamsMetric {
    /// the metric sized for the rule
    pub fn new(rule: &Rule) -> Self {
        match rule.metric_type {
            MetricType::QPS => {
                let capacity = if rule.params_max_capacity > 0 {
                    rule.params_max_capacity
                } else if rule.duration_in_sec == 0 {
                    PARAMS_MAX_CAPACITY
                } else {
                    min(
                        PARAMS_MAX_CAPACITY,
                        PARAMS_CAPACITY_BASE * rule.duration_in_sec as usize,
                    )
                };
                Self::with_qps_capacity(capacity)
            }
            MetricType::Concurrency => {
                let capacity = if rule.params_max_capacity > 0 {
                    rule.params_max_capacity
                } else {
                    CONCURRENCY_MAX_COUNT
                };
                Self::with_concurrency_capacity(capacity)
            }
        }
    }

    pub fn with_qps_capacity(capacity: usize) -> Self {
        ParamsMetric {
            rule_time_counter: Counter::with_capacity(capacity),
            rule_token_counter: Counter::with_capacity(capacity),
            others_time_counter: Counter::with_capacity(1),
            others_token_counter: Counter::with_capacity(1),
            ..Default::default()
        }
    }

    pub fn with_concurrency_capacity(capacity: usize) -> Self {
        ParamsMetric {
            concurrency_counter: Counter::with_capacity(capacity),
            others_concurrency_counter: Counter::with_capacity(1),
            ..Default::default()
        }
    }

    /// `resolve_qps` finds the cell of `arg` for the token and time counters.
    /// The least recent value is idle once no token was added for it within `duration_ms`.
    pub fn resolve_qps(&self, arg: &ParamKey, now: u64, duration_ms: u64) -> ParamCell {
        let time_counter = &self.rule_time_counter;
        if time_counter.contains(arg) || !time_counter.is_full() {
            return ParamCell::Value(arg.clone());
        }
        match time_counter.peek_lru() {
            Some((oldest, last_add_time)) if now.saturating_sub(last_add_time) > duration_ms => {
                time_counter.remove(&oldest);
                self.rule_token_counter.remove(&oldest);
                ParamCell::Value(arg.clone())
            }
            _ => ParamCell::Others,
        }
    }

    /// `resolve_concurrency` finds the cell of `arg` for the concurrency counter.
    /// The least recent value is idle once it has no call in flight.
    pub fn resolve_concurrency(&self, arg: &ParamKey) -> ParamCell {
        let counter = &self.concurrency_counter;
        if counter.contains(arg) || !counter.is_full() {
            return ParamCell::Value(arg.clone());
        }
        match counter.peek_lru() {
            Some((oldest, 0)) => {
                counter.remove(&oldest);
                ParamCell::Value(arg.clone())
            }
            _ => ParamCell::Others,
        }
    }

    pub fn time_counter(&self, cell: &ParamCell) -> &Counter {
        match cell {
            ParamCell::Value(_) => &self.rule_time_counter,
            ParamCell::Others => &self.others_time_counter,
        }
    }

    pub fn token_counter(&self, cell: &ParamCell) -> &Counter {
        match cell {
            ParamCell::Value(_) => &self.rule_token_counter,
            ParamCell::Others => &self.others_token_counter,
        }
    }

    /// the in-flight counter of the cell, created on first use
    pub fn concurrency_of(&self, cell: &ParamCell) -> Arc<AtomicU64> {
        let counter = match cell {
            ParamCell::Value(_) => &self.concurrency_counter,
            ParamCell::Others => &self.others_concurrency_counter,
        };
        counter.get_or_insert(cell.key(), 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn capacity() {
        let metric = ParamsMetric::new(&Rule {
            metric_type: MetricType::QPS,
            duration_in_sec: 10,
            ..Default::default()
        });
        assert_eq!(PARAMS_MAX_CAPACITY, metric.rule_time_counter.cap());
        let metric = ParamsMetric::new(&Rule {
            metric_type: MetricType::QPS,
            duration_in_sec: 2,
            ..Default::default()
        });
        assert_eq!(2 * PARAMS_CAPACITY_BASE, metric.rule_token_counter.cap());
        let metric = ParamsMetric::new(&Rule {
            metric_type: MetricType::Concurrency,
            ..Default::default()
        });
        assert_eq!(CONCURRENCY_MAX_COUNT, metric.concurrency_counter.cap());
        let metric = ParamsMetric::new(&Rule {
            metric_type: MetricType::Concurrency,
            params_max_capacity: 100,
            ..Default::default()
        });
        assert_eq!(100, metric.concurrency_counter.cap());
    }

    #[test]
    fn qps_others_when_full_and_busy() {
        let metric = ParamsMetric::with_qps_capacity(2);
        let now = 10_000;
        metric.rule_time_counter.add("a".into(), now);
        metric.rule_time_counter.add("b".into(), now);
        assert_eq!(
            ParamCell::Value("a".into()),
            metric.resolve_qps(&"a".into(), now, 1000)
        );
        assert_eq!(ParamCell::Others, metric.resolve_qps(&"c".into(), now, 1000));
        assert_eq!(2, metric.rule_time_counter.len());
    }

    #[test]
    fn qps_evicts_idle_tail() {
        let metric = ParamsMetric::with_qps_capacity(2);
        metric.rule_time_counter.add("a".into(), 1_000);
        metric.rule_token_counter.add("a".into(), 5);
        metric.rule_time_counter.add("b".into(), 10_000);
        assert_eq!(
            ParamCell::Value("c".into()),
            metric.resolve_qps(&"c".into(), 10_500, 1000)
        );
        assert!(!metric.rule_time_counter.contains(&"a".into()));
        assert!(!metric.rule_token_counter.contains(&"a".into()));
    }

    #[test]
    fn concurrency_cells() {
        let metric = ParamsMetric::with_concurrency_capacity(1);
        let cell = metric.resolve_concurrency(&"a".into());
        let a = metric.concurrency_of(&cell);
        a.fetch_add(1, Ordering::SeqCst);
        // "a" is in flight and occupies the only entry
        let cell = metric.resolve_concurrency(&"b".into());
        assert!(cell.is_others());
        let others = metric.concurrency_of(&cell);
        others.fetch_add(1, Ordering::SeqCst);
        assert_eq!(OTHERS_KEY, cell.key());
        assert_eq!(1, metric.concurrency_of(&ParamCell::Others).load(Ordering::SeqCst));

        a.fetch_sub(1, Ordering::SeqCst);
        assert_eq!(
            ParamCell::Value("b".into()),
            metric.resolve_concurrency(&"b".into())
        );
        assert!(!metric.concurrency_counter.contains(&"a".into()));
    }
}
