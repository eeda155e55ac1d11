use super::*;
use crate::{
    base::{
        BaseSlot, BlockType, ConcurrencyStat, EntryContext, MetricEvent, ReadStat, Slot, Snapshot,
        StatNode, TokenResult, TrafficType,
    },
    stat::{default_node_storage, NodeStorage},
    system_metric,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 6000;

/// AdaptiveEstimator tells whether the process is already running at its capacity,
/// given the statistics of all the inbound traffic.
/// Load and CPU usage rules with the `BBR` strategy only block when it says so.
pub trait AdaptiveEstimator: Send + Sync {
    fn is_saturated(&self, inbound: &dyn StatNode) -> bool;
}

/// BbrEstimator follows the idea of TCP BBR: the process is saturated
/// when the in-flight requests exceed the estimated bandwidth-delay product,
/// i.e. the max completed QPS of a bucket multiplied by the min response time.
#[derive(Debug, Default)]
pub struct BbrEstimator {}

impl AdaptiveEstimator for BbrEstimator {
    fn is_saturated(&self, inbound: &dyn StatNode) -> bool {
        let concurrency = inbound.current_concurrency() as f64;
        let min_rt = inbound.min_rt();
        let max_complete = inbound.max_avg(MetricEvent::Complete);
        concurrency > 1.0 && concurrency > max_complete * min_rt / 1000.0
    }
}

lazy_static! {
    pub static ref DEFAULT_ADAPTIVE_SLOT: Arc<AdaptiveSlot> = Arc::new(AdaptiveSlot::new(
        default_rule_manager(),
        default_node_storage(),
        Arc::new(BbrEstimator::default()),
    ));
}

pub fn default_adaptive_slot() -> Arc<AdaptiveSlot> {
    DEFAULT_ADAPTIVE_SLOT.clone()
}

/// AdaptiveSlot protects the whole process against the inbound traffic
/// according to the global system rules.
pub struct AdaptiveSlot {
    manager: Arc<RuleManager>,
    storage: Arc<NodeStorage>,
    estimator: Arc<dyn AdaptiveEstimator>,
}

impl AdaptiveSlot {
    pub fn new(
        manager: Arc<RuleManager>,
        storage: Arc<NodeStorage>,
        estimator: Arc<dyn AdaptiveEstimator>,
    ) -> Self {
        AdaptiveSlot {
            manager,
            storage,
            estimator,
        }
    }

    /// the value of the rule's metric and whether it stays under the threshold
    fn can_pass_check(&self, rule: &Rule) -> (bool, &'static str, f64) {
        let threshold = rule.threshold;
        let inbound = self.storage.inbound_node();
        match rule.metric_type {
            MetricType::InboundQPS => {
                let qps = inbound.qps(MetricEvent::Pass);
                (qps < threshold, "system qps check blocked", qps)
            }
            MetricType::Concurrency => {
                let n = inbound.current_concurrency() as f64;
                (n < threshold, "system concurrency check blocked", n)
            }
            MetricType::AvgRT => {
                let rt = inbound.avg_rt();
                (rt < threshold, "system avg rt check blocked", rt)
            }
            MetricType::Load => {
                let load = system_metric::current_load();
                let blocked = load > threshold && self.adaptive_blocks(rule, inbound.as_ref());
                (!blocked, "system load check blocked", load)
            }
            MetricType::CpuUsage => {
                let usage = system_metric::current_cpu_usage() as f64;
                let blocked = usage > threshold && self.adaptive_blocks(rule, inbound.as_ref());
                (!blocked, "system cpu usage check blocked", usage)
            }
        }
    }

    fn adaptive_blocks(&self, rule: &Rule, inbound: &dyn StatNode) -> bool {
        match rule.strategy {
            AdaptiveStrategy::NoAdaptive => true,
            AdaptiveStrategy::BBR => self.estimator.is_saturated(inbound),
        }
    }
}

impl BaseSlot for AdaptiveSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl Slot for AdaptiveSlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        if *ctx.resource().traffic_type() != TrafficType::Inbound {
            return TokenResult::new_pass();
        }
        let snapshot = self.manager.snapshot();
        for rule in snapshot.rules() {
            let (passed, msg, value) = self.can_pass_check(rule);
            if passed {
                continue;
            }
            return TokenResult::new_blocked_with_cause(
                BlockType::System,
                msg.into(),
                rule.clone(),
                Arc::new(value) as Arc<Snapshot>,
            );
        }
        TokenResult::new_pass()
    }
}
