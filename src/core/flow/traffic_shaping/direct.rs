use super::{Calculator, Checker};
use crate::flow::{MetricType, Rule};
use crate::base::{BlockType, MetricEvent, StatNode, TokenResult};
use std::sync::Arc;

const BLOCK_MSG_REJECT: &str = "flow reject check blocked";

/// Provide a determined threshold
#[derive(Debug)]
pub struct DirectCalculator {
    threshold: f64,
}

impl DirectCalculator {
    pub fn new(rule: Arc<Rule>) -> Self {
        DirectCalculator {
            threshold: rule.threshold,
        }
    }
}

impl Calculator for DirectCalculator {
    fn calculate_allowed_threshold(
        &self,
        _stat_node: Option<&Arc<dyn StatNode>>,
        _batch_count: u32,
        _flag: i32,
    ) -> f64 {
        self.threshold
    }
}

/// Directly reject when the current QPS or concurrency plus the batch exceeds the threshold
#[derive(Debug)]
pub struct RejectChecker {
    rule: Arc<Rule>,
}

impl RejectChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        RejectChecker { rule }
    }
}

impl Checker for RejectChecker {
    fn do_check(
        &self,
        stat_node: Option<&Arc<dyn StatNode>>,
        batch_count: u32,
        threshold: f64,
    ) -> TokenResult {
        let node = match stat_node {
            Some(node) => node,
            None => return TokenResult::new_pass(),
        };
        let cur_count = match self.rule.metric_type {
            MetricType::QPS => node.qps(MetricEvent::Pass),
            MetricType::Concurrency => node.current_concurrency() as f64,
        };
        if cur_count + batch_count as f64 > threshold {
            TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                BLOCK_MSG_REJECT.into(),
                self.rule.clone(),
                Arc::new(cur_count),
            )
        } else {
            TokenResult::new_pass()
        }
    }
}
