use crate::{base::SentinelRule, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type Id = String;

/// the rule applies to every caller, using the statistics of the cluster node
pub const LIMIT_ORIGIN_DEFAULT: &str = "default";
/// the rule applies to the callers that no other rule of the resource names
pub const LIMIT_ORIGIN_OTHER: &str = "other";

/// MetricType indicates the metric the threshold is compared with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    /// passed requests per second
    QPS,
    /// in-flight requests
    Concurrency,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::QPS
    }
}

/// RelationStrategy indicates the flow control strategy based on the relation of invocations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationStrategy {
    /// flow control by the statistics of the current resource directly
    CurrentResource,
    /// flow control by the statistics of `ref_resource` rather than the current resource
    AssociatedResource,
    /// flow control only on the calls entering through the context named `ref_resource`
    ChainedResource,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::CurrentResource
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum CalculateStrategy {
    Direct,
    WarmUp,
    #[serde(skip)]
    Custom(u8),
}

impl Default for CalculateStrategy {
    fn default() -> CalculateStrategy {
        CalculateStrategy::Direct
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum ControlStrategy {
    Reject,
    /// Throttling indicates that pending requests will be throttled,
    /// wait in queue (until free capacity is available)
    Throttling,
    #[serde(skip)]
    Custom(u8),
}

impl Default for ControlStrategy {
    fn default() -> ControlStrategy {
        ControlStrategy::Reject
    }
}

/// Rule describes the strategy of flow control on one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: Id,
    /// `resource` represents the resource name.
    pub resource: String,
    pub metric_type: MetricType,
    /// `limit_origin` is `"default"`, `"other"` or the name of a specific caller
    pub limit_origin: String,
    pub relation_strategy: RelationStrategy,
    pub ref_resource: String,
    pub calculate_strategy: CalculateStrategy,
    pub control_strategy: ControlStrategy,
    /// QPS or concurrency, depending on `metric_type`
    pub threshold: f64,
    pub warm_up_period_sec: u32,
    pub warm_up_cold_factor: u32,
    /// `max_queueing_time_ms` only takes effect when `control_strategy` is Throttling.
    /// When `max_queueing_time_ms` is 0, it means Throttling only controls interval of requests,
    /// and requests exceeding the threshold will be rejected directly.
    pub max_queueing_time_ms: u32,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            metric_type: MetricType::default(),
            limit_origin: LIMIT_ORIGIN_DEFAULT.into(),
            relation_strategy: RelationStrategy::default(),
            ref_resource: String::default(),
            calculate_strategy: CalculateStrategy::default(),
            control_strategy: ControlStrategy::default(),
            threshold: 0.0,
            warm_up_period_sec: 0,
            warm_up_cold_factor: 0,
            max_queueing_time_ms: 0,
        }
    }
}

impl Rule {
    pub fn is_default_origin(&self) -> bool {
        self.limit_origin == LIMIT_ORIGIN_DEFAULT
    }

    pub fn is_other_origin(&self) -> bool {
        self.limit_origin == LIMIT_ORIGIN_OTHER
    }

    /// the rule limits one named caller
    pub fn is_specific_origin(&self) -> bool {
        !self.is_default_origin() && !self.is_other_origin()
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource.hash(state);
        self.limit_origin.hash(state);
        self.ref_resource.hash(state);
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
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.limit_origin.trim().is_empty() {
            return Err(Error::msg("empty limit_origin"));
        }
        if self.relation_strategy != RelationStrategy::CurrentResource
            && self.ref_resource.is_empty()
        {
            return Err(Error::msg(
                "ref_resource must be non empty when relation_strategy is AssociatedResource or ChainedResource",
            ));
        }
        if self.metric_type == MetricType::Concurrency
            && self.control_strategy != ControlStrategy::Reject
        {
            return Err(Error::msg(
                "only ControlStrategy::Reject is allowed when metric_type is Concurrency",
            ));
        }
        if self.calculate_strategy == CalculateStrategy::WarmUp {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be great than 0"));
            }
            if self.warm_up_cold_factor == 1 {
                return Err(Error::msg("warm_up_cold_factor must be great than 1"));
            }
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.metric_type == other.metric_type
            && self.limit_origin == other.limit_origin
            && self.relation_strategy == other.relation_strategy
            && self.ref_resource == other.ref_resource
            && self.calculate_strategy == other.calculate_strategy
            && self.control_strategy == other.control_strategy
            && self.threshold == other.threshold
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid() {
        let rule = Rule {
            resource: "abc".into(),
            threshold: 10.0,
            ..Default::default()
        };
        assert!(rule.is_valid().is_ok());
        assert!(rule.is_default_origin());
        assert!(!rule.is_specific_origin());
    }

    #[test]
    fn invalid() {
        let cases = vec![
            Rule {
                threshold: 10.0,
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                threshold: -1.0,
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                limit_origin: " ".into(),
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                relation_strategy: RelationStrategy::AssociatedResource,
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                relation_strategy: RelationStrategy::ChainedResource,
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                metric_type: MetricType::Concurrency,
                control_strategy: ControlStrategy::Throttling,
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                calculate_strategy: CalculateStrategy::WarmUp,
                warm_up_cold_factor: 3,
                ..Default::default()
            },
            Rule {
                resource: "abc".into(),
                calculate_strategy: CalculateStrategy::WarmUp,
                warm_up_period_sec: 10,
                warm_up_cold_factor: 1,
                ..Default::default()
            },
        ];
        for rule in cases {
            assert!(rule.is_valid().is_err(), "{:?}", rule);
        }
    }

    #[test]
    fn equality_ignores_id() {
        let r1 = Rule {
            resource: "abc".into(),
            threshold: 10.0,
            ..Default::default()
        };
        let mut r2 = r1.clone();
        r2.id = "another".into();
        assert_eq!(r1, r2);
        r2.threshold = 20.0;
        assert_ne!(r1, r2);
    }

    #[test]
    fn deserialize_with_defaults() {
        let rule: Rule =
            serde_json::from_str(r#"{"resource":"abc","threshold":5.0,"limit_origin":"app-a"}"#)
                .unwrap();
        assert_eq!("abc", rule.resource);
        assert_eq!(MetricType::QPS, rule.metric_type);
        assert_eq!(RelationStrategy::CurrentResource, rule.relation_strategy);
        assert!(rule.is_specific_origin());
        assert!(!rule.id.is_empty());
    }
}
