use super::*;
use crate::{base::SentinelRule, logging, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A circuit breaking (degrade) rule of one resource.
///
/// The breaker counts the completed calls of the resource over a sliding window of
/// `stat_interval_ms` and opens once `strategy` finds `threshold` exceeded with at least
/// `min_request_amount` calls in the window. It stays open for `retry_timeout_ms`, then lets a
/// single probe through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub id: String,
    pub resource: String,
    pub strategy: BreakerStrategy,
    pub retry_timeout_ms: u32,
    pub min_request_amount: u64,
    pub stat_interval_ms: u32,
    /// buckets of the window, falls back to 1 when it does not divide `stat_interval_ms`
    pub stat_sliding_window_bucket_count: u32,
    /// calls slower than this are slow calls, `SlowRequestRatio` only
    pub max_allowed_rt_ms: u64,
    /// a ratio in `[0, 1]` for the ratio strategies, milliseconds for `AverageRt`,
    /// a number of errors for `ErrorCount`
    pub threshold: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::new(),
            strategy: BreakerStrategy::default(),
            retry_timeout_ms: 0,
            min_request_amount: 0,
            stat_interval_ms: 0,
            stat_sliding_window_bucket_count: 0,
            max_allowed_rt_ms: 0,
            threshold: 0.0,
        }
    }
}

impl Rule {
    /// Whether a breaker built for `other` can keep its window when this rule replaces it.
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.window_key() == other.window_key()
    }

    pub fn get_rule_stat_sliding_window_bucket_count(&self) -> u32 {
        match self.stat_sliding_window_bucket_count {
            0 => 1,
            count if self.stat_interval_ms % count != 0 => 1,
            count => count,
        }
    }

    fn window_key(&self) -> (&str, BreakerStrategy, u32, u32) {
        (
            self.resource.as_str(),
            self.strategy,
            self.stat_interval_ms,
            self.stat_sliding_window_bucket_count,
        )
    }

    fn is_ratio(&self) -> bool {
        matches!(
            self.strategy,
            BreakerStrategy::SlowRequestRatio | BreakerStrategy::ErrorRatio
        )
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
        if self.stat_interval_ms == 0 {
            return Err(Error::msg("invalid stat_interval_ms"));
        }
        if self.retry_timeout_ms == 0 {
            return Err(Error::msg("invalid retry_timeout_ms"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("invalid threshold"));
        }
        if self.is_ratio() && self.threshold > 1.0 {
            return Err(Error::msg(format!(
                "invalid {:?} ratio threshold (valid range: [0.0, 1.0])",
                self.strategy
            )));
        }
        if self.get_rule_stat_sliding_window_bucket_count() != self.stat_sliding_window_bucket_count
            && self.stat_sliding_window_bucket_count != 0
        {
            logging::warn!(
                "[CircuitBreaker IsValidRule] stat_sliding_window_bucket_count does not divide stat_interval_ms, a single bucket is used, rule {:?}",
                self
            );
        }
        Ok(())
    }
}

/// Rules are equal when they build the same breaker, `id` is ignored.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        let slow_rt_matches = self.strategy != BreakerStrategy::SlowRequestRatio
            || self.max_allowed_rt_ms == other.max_allowed_rt_ms;
        self.is_stat_reusable(other)
            && self.retry_timeout_ms == other.retry_timeout_ms
            && self.min_request_amount == other.min_request_amount
            && self.threshold == other.threshold
            && slow_rt_matches
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn error_count(threshold: f64) -> Rule {
        Rule {
            resource: "abc".into(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 1000,
            stat_interval_ms: 1000,
            threshold,
            ..Default::default()
        }
    }

    #[test]
    fn reuse_and_equality() {
        let base = error_count(3.0);
        // (changed rule, stat reusable, equal)
        let cases = vec![
            (
                Rule {
                    resource: "def".into(),
                    ..base.clone()
                },
                false,
                false,
            ),
            (
                Rule {
                    strategy: BreakerStrategy::AverageRt,
                    ..base.clone()
                },
                false,
                false,
            ),
            (
                Rule {
                    stat_interval_ms: 5000,
                    ..base.clone()
                },
                false,
                false,
            ),
            (
                Rule {
                    retry_timeout_ms: 3000,
                    ..base.clone()
                },
                true,
                false,
            ),
            (error_count(5.0), true, false),
            // only the slow request strategy reads max_allowed_rt_ms
            (
                Rule {
                    max_allowed_rt_ms: 2000,
                    ..base.clone()
                },
                true,
                true,
            ),
            // a fresh id does not matter
            (error_count(3.0), true, true),
        ];
        for (rule, reusable, equal) in cases {
            assert_eq!(reusable, base.is_stat_reusable(&rule), "{:?}", rule);
            assert_eq!(equal, base == rule, "{:?}", rule);
        }

        let slow = Rule {
            strategy: BreakerStrategy::SlowRequestRatio,
            max_allowed_rt_ms: 100,
            threshold: 0.5,
            ..base
        };
        assert!(slow.clone() != Rule {
            max_allowed_rt_ms: 200,
            ..slow
        });
    }

    #[test]
    fn bucket_count() {
        // (bucket count, interval, used bucket count)
        let cases = vec![(0, 1000, 1), (1, 1000, 1), (10, 1000, 10), (30, 1000, 1), (200, 100, 1)];
        for (bucket_count, interval, expected) in cases {
            let rule = Rule {
                stat_sliding_window_bucket_count: bucket_count,
                stat_interval_ms: interval,
                ..Default::default()
            };
            assert_eq!(expected, rule.get_rule_stat_sliding_window_bucket_count());
        }
    }

    #[test]
    fn valid() {
        let rules = vec![
            Rule {
                strategy: BreakerStrategy::SlowRequestRatio,
                max_allowed_rt_ms: 20,
                ..error_count(0.1)
            },
            Rule {
                strategy: BreakerStrategy::AverageRt,
                ..error_count(200.0)
            },
            Rule {
                strategy: BreakerStrategy::ErrorRatio,
                stat_sliding_window_bucket_count: 7,
                ..error_count(0.3)
            },
            error_count(10.0),
        ];
        for rule in rules {
            assert!(rule.is_valid().is_ok(), "{:?}", rule);
        }
    }

    #[test]
    fn invalid() {
        let base = error_count(3.0);
        let cases = vec![
            (
                Rule {
                    resource: String::new(),
                    ..base.clone()
                },
                "empty resource name",
            ),
            (
                Rule {
                    stat_interval_ms: 0,
                    ..base.clone()
                },
                "invalid stat_interval_ms",
            ),
            (
                Rule {
                    retry_timeout_ms: 0,
                    ..base.clone()
                },
                "invalid retry_timeout_ms",
            ),
            (error_count(-4.0), "invalid threshold"),
            (
                Rule {
                    strategy: BreakerStrategy::ErrorRatio,
                    ..error_count(2.0)
                },
                "invalid ErrorRatio ratio threshold (valid range: [0.0, 1.0])",
            ),
        ];
        for (rule, msg) in cases {
            assert_eq!(msg, rule.is_valid().unwrap_err().to_string());
        }
    }

    #[test]
    fn deserialize_with_defaults() {
        let rule: Rule = serde_json::from_str(
            r#"{"resource":"abc","strategy":"ErrorRatio","retry_timeout_ms":1000,"stat_interval_ms":1000,"threshold":0.5}"#,
        )
        .unwrap();
        assert_eq!(BreakerStrategy::ErrorRatio, rule.strategy);
        assert_eq!(0, rule.min_request_amount);
        assert!(!rule.id.is_empty());
        assert!(rule.is_valid().is_ok());
    }
}
