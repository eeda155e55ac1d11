use crate::{
    base::{ParamKey, SentinelRule},
    Error,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// How a QPS rule treats the calls of a value beyond its threshold.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum ControlStrategy {
    /// token bucket per value, refilled every `duration_in_sec`
    Reject,
    /// pace the calls of each value, queueing up to `max_queueing_time_ms`
    Throttling,
    #[serde(skip)]
    Custom(u8),
}

impl Default for ControlStrategy {
    fn default() -> Self {
        ControlStrategy::Reject
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricType {
    /// in-flight calls per value
    Concurrency,
    /// calls per value in each `duration_in_sec`
    QPS,
}

impl Default for MetricType {
    fn default() -> Self {
        MetricType::Concurrency
    }
}

/// A hot parameter rule limits every value of one argument of a resource on its own.
///
/// The value is taken from the attachments by `param_key` when it is set, from the
/// arguments by `param_index` otherwise. Only `params_max_capacity` values are tracked one by
/// one; the values that do not fit share the "others" statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub id: String,
    pub resource: String,
    pub metric_type: MetricType,
    /// QPS rules only
    pub control_strategy: ControlStrategy,
    /// negative indexes count from the end of the arguments
    pub param_index: isize,
    pub param_key: String,
    pub threshold: u64,
    /// QPS throttling only
    pub max_queueing_time_ms: u64,
    /// extra tokens on top of `threshold`, QPS reject only
    pub burst_count: u64,
    /// QPS rules only
    pub duration_in_sec: u64,
    /// 0 picks a default capacity, scaled by the duration for QPS rules
    pub params_max_capacity: usize,
    /// thresholds of particular values, overriding `threshold`
    pub specific_items: HashMap<ParamKey, u64>,
    /// threshold of the "others" statistics, `threshold` when unset
    pub others_threshold: Option<u64>,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            metric_type: MetricType::default(),
            control_strategy: ControlStrategy::default(),
            param_index: 0,
            param_key: String::default(),
            threshold: 0,
            max_queueing_time_ms: 0,
            burst_count: 0,
            duration_in_sec: 0,
            params_max_capacity: 0,
            specific_items: HashMap::default(),
            others_threshold: None,
        }
    }
}

impl Rule {
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.control_strategy == other.control_strategy
            && self.params_max_capacity == other.params_max_capacity
            && self.duration_in_sec == other.duration_in_sec
            && self.metric_type == other.metric_type
    }

    /// the threshold of the value of a cell,
    /// settings of `specific_items` take precedence over `threshold`
    pub fn threshold_of(&self, cell: &super::ParamCell) -> u64 {
        match cell {
            super::ParamCell::Value(arg) => self
                .specific_items
                .get(arg)
                .copied()
                .unwrap_or(self.threshold),
            super::ParamCell::Others => self.others_threshold.unwrap_or(self.threshold),
        }
    }

    pub fn duration_in_ms(&self) -> u64 {
        self.duration_in_sec * 1000
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
    }
}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.metric_type == MetricType::QPS && self.duration_in_sec == 0 {
            return Err(Error::msg("invalid duration"));
        }
        if self.param_index > 0 && !self.param_key.is_empty() {
            return Err(Error::msg(
                "param index and param key are mutually exclusive",
            ));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.metric_type == other.metric_type
            && self.control_strategy == other.control_strategy
            && self.params_max_capacity == other.params_max_capacity
            && self.param_index == other.param_index
            && self.param_key == other.param_key
            && self.threshold == other.threshold
            && self.duration_in_sec == other.duration_in_sec
            && self.specific_items == other.specific_items
            && self.others_threshold == other.others_threshold
            && match self.control_strategy {
                ControlStrategy::Reject => self.burst_count == other.burst_count,
                ControlStrategy::Throttling => {
                    self.max_queueing_time_ms == other.max_queueing_time_ms
                }
                ControlStrategy::Custom(_) => {
                    self.burst_count == other.burst_count
                        && self.max_queueing_time_ms == other.max_queueing_time_ms
                }
            }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", fmtted)
    }
}
