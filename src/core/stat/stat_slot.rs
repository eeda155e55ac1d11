use super::{default_node_storage, NodeStorage};
use crate::base::{
    BaseSlot, BlockError, EntryContext, MetricEvent, Slot, StatNode, TrafficType,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 4000;

lazy_static! {
    pub static ref DEFAULT_STAT_SLOT: Arc<StatisticSlot> =
        Arc::new(StatisticSlot::new(default_node_storage()));
}

pub fn default_stat_slot() -> Arc<StatisticSlot> {
    DEFAULT_STAT_SLOT.clone()
}

/// StatisticSlot records the decision and the completion of each entry
/// on the default, cluster and origin nodes of the resource,
/// and on the global inbound node for inbound traffic.
pub struct StatisticSlot {
    storage: Arc<NodeStorage>,
}

impl StatisticSlot {
    pub fn new(storage: Arc<NodeStorage>) -> Self {
        StatisticSlot { storage }
    }

    fn stat_nodes(&self, ctx: &EntryContext) -> Vec<Arc<dyn StatNode>> {
        let mut nodes: Vec<Arc<dyn StatNode>> = Vec::with_capacity(4);
        if let Some(node) = ctx.default_node() {
            nodes.push(node.stat());
        }
        if let Some(node) = ctx.cluster_node() {
            nodes.push(node.stat());
        }
        if let Some(node) = ctx.origin_node() {
            nodes.push(node.clone());
        }
        if *ctx.resource().traffic_type() == TrafficType::Inbound {
            nodes.push(self.storage.inbound_node());
        }
        nodes
    }

    fn record_pass_for(&self, node: &Arc<dyn StatNode>, count: u32) {
        node.increase_concurrency();
        node.add_count(MetricEvent::Pass, count as u64);
    }

    fn record_block_for(&self, node: &Arc<dyn StatNode>, count: u32) {
        node.add_count(MetricEvent::Block, count as u64)
    }

    fn record_complete_for(
        &self,
        node: &Arc<dyn StatNode>,
        count: u32,
        round_trip: u64,
        failed: bool,
    ) {
        node.add_count(MetricEvent::Rt, round_trip);
        node.add_count(MetricEvent::Complete, count as u64);
        if failed {
            node.add_count(MetricEvent::Error, count as u64);
        }
        node.decrease_concurrency();
    }
}

impl BaseSlot for StatisticSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl Slot for StatisticSlot {
    fn on_entry_pass(&self, ctx: &EntryContext) {
        let count = ctx.input().batch_count();
        for node in self.stat_nodes(ctx) {
            self.record_pass_for(&node, count);
        }
    }

    fn on_entry_blocked(&self, ctx: &EntryContext, _block_error: &BlockError) {
        let count = ctx.input().batch_count();
        for node in self.stat_nodes(ctx) {
            self.record_block_for(&node, count);
        }
    }

    /// only the passed entries are completed
    fn exit(&self, ctx: &mut EntryContext) {
        if ctx.is_blocked() {
            return;
        }
        let count = ctx.input().batch_count();
        let round_trip = ctx.round_trip();
        let failed = ctx.get_err().is_some();
        for node in self.stat_nodes(ctx) {
            self.record_complete_for(&node, count, round_trip, failed);
        }
    }
}
