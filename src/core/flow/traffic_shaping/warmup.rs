//! `WarmUpCalculator` is based on the **Token Bucket** algorithm.
//! A cold system starts from `threshold / cold_factor`
//! and ramps up to `threshold` within `warm_up_period_sec`.

use super::Calculator;
use crate::base::{MetricEvent, StatNode};
use crate::flow::Rule;
use crate::{config, logging, utils};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug)]
pub struct WarmUpCalculator {
    threshold: f64,
    cold_factor: u32,
    warning_token: u64,
    max_token: u64,
    slope: f64,
    stored_tokens: AtomicU64,
    last_filled_time: AtomicU64,
}

impl WarmUpCalculator {
    pub fn new(rule: Arc<Rule>) -> Self {
        let mut cold_factor = rule.warm_up_cold_factor;
        if cold_factor <= 1 {
            logging::warn!(
                "[WarmUpCalculator::new] Invalid warm_up_cold_factor, use default warm up cold factor value: {}",
                config::WARM_UP_COLD_FACTOR
            );
            cold_factor = config::WARM_UP_COLD_FACTOR;
        };
        let threshold = rule.threshold;
        let warm_up_period = rule.warm_up_period_sec as f64;

        let cold_factor_plus = (cold_factor + 1) as f64;
        let cold_factor_minus = (cold_factor - 1) as f64;
        let warning_token = (warm_up_period * threshold / cold_factor_minus) as u64;
        let max_token = warning_token + (2.0 * warm_up_period * threshold / cold_factor_plus) as u64;
        let slope = if max_token > warning_token && threshold > 0.0 {
            cold_factor_minus / threshold / (max_token - warning_token) as f64
        } else {
            0.0
        };

        WarmUpCalculator {
            cold_factor,
            warning_token,
            max_token,
            slope,
            threshold,
            stored_tokens: AtomicU64::new(0),
            last_filled_time: AtomicU64::new(0),
        }
    }

    pub fn warning_token(&self) -> u64 {
        self.warning_token
    }

    pub fn max_token(&self) -> u64 {
        self.max_token
    }

    pub fn stored_tokens(&self) -> u64 {
        self.stored_tokens.load(Ordering::SeqCst)
    }

    fn sync_token(&self, pass_qps: f64) {
        let mut curr_time = utils::curr_time_millis();
        curr_time -= curr_time % 1000;

        let old_last_fill_time = self.last_filled_time.load(Ordering::SeqCst);
        if curr_time <= old_last_fill_time {
            return;
        }

        let old_value = self.stored_tokens.load(Ordering::SeqCst);
        let new_value = self.cool_down_tokens(curr_time, pass_qps);

        if self
            .stored_tokens
            .compare_exchange(old_value, new_value, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            let consumed = pass_qps as u64;
            let _ = self
                .stored_tokens
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                    Some(v.saturating_sub(consumed))
                });
            self.last_filled_time.store(curr_time, Ordering::SeqCst);
        }
    }

    fn cool_down_tokens(&self, curr_time: u64, pass_qps: f64) -> u64 {
        let old_value = self.stored_tokens.load(Ordering::SeqCst);
        let mut new_value = old_value;
        let last_time = self.last_filled_time.load(Ordering::SeqCst);
        // Prerequisites for adding a token:
        // When token consumption is much lower than the warning line
        if old_value < self.warning_token
            || pass_qps < (self.threshold / self.cold_factor as f64).floor()
        {
            new_value = old_value
                .saturating_add(((curr_time - last_time) as f64 * self.threshold / 1000.0) as u64);
        }

        std::cmp::min(new_value, self.max_token)
    }
}

impl Calculator for WarmUpCalculator {
    fn calculate_allowed_threshold(
        &self,
        stat_node: Option<&Arc<dyn StatNode>>,
        _batch_count: u32,
        _flag: i32,
    ) -> f64 {
        let previous_qps = stat_node
            .map(|node| node.qps_previous(MetricEvent::Pass))
            .unwrap_or(0.0);
        self.sync_token(previous_qps);
        let rest_token = self.stored_tokens.load(Ordering::SeqCst);

        if rest_token >= self.warning_token && self.slope > 0.0 {
            let above_token = rest_token - self.warning_token;
            // compute warning QPS
            utils::next_after(1.0 / (above_token as f64 * self.slope + 1.0 / self.threshold))
        } else {
            self.threshold
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MockStatNode;

    fn calculator() -> WarmUpCalculator {
        WarmUpCalculator::new(Arc::new(Rule {
            resource: "abc".into(),
            threshold: 100.0,
            warm_up_period_sec: 10,
            warm_up_cold_factor: 3,
            ..Default::default()
        }))
    }

    #[test]
    fn tokens() {
        let c = calculator();
        // 10 * 100 / (3 - 1)
        assert_eq!(500, c.warning_token());
        // 500 + 2 * 10 * 100 / (3 + 1)
        assert_eq!(1000, c.max_token());
    }

    #[test]
    fn default_cold_factor() {
        let c = WarmUpCalculator::new(Arc::new(Rule {
            resource: "abc".into(),
            threshold: 100.0,
            warm_up_period_sec: 10,
            ..Default::default()
        }));
        assert_eq!(config::WARM_UP_COLD_FACTOR, c.cold_factor);
    }

    #[test]
    fn cold_start() {
        let c = calculator();
        let mut node = MockStatNode::new();
        node.expect_qps_previous().return_const(0.0);
        let node: Arc<dyn StatNode> = Arc::new(node);
        let threshold = c.calculate_allowed_threshold(Some(&node), 1, 0);
        // the bucket is full when cold, so the allowed QPS is about threshold / cold_factor
        assert_eq!(1000, c.stored_tokens());
        assert!(threshold > 33.0 && threshold < 34.0, "{}", threshold);
    }

    #[test]
    fn warmed_up() {
        let c = calculator();
        c.stored_tokens.store(100, Ordering::SeqCst);
        c.last_filled_time.store(u64::MAX, Ordering::SeqCst);
        let threshold = c.calculate_allowed_threshold(None, 1, 0);
        assert!((threshold - 100.0).abs() < f64::EPSILON);
    }
}
