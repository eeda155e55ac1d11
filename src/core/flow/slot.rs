use super::*;
use crate::{
    base::{BaseSlot, EntryContext, Slot, StatNode, TokenResult},
    logging,
    stat::{default_node_storage, NodeStorage},
    utils,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 8000;

lazy_static! {
    pub static ref DEFAULT_FLOW_SLOT: Arc<FlowSlot> =
        Arc::new(FlowSlot::new(default_rule_manager(), default_node_storage()));
}

pub fn default_flow_slot() -> Arc<FlowSlot> {
    DEFAULT_FLOW_SLOT.clone()
}

/// FlowSlot checks the flow rules of the resource in the order they were loaded.
/// It waits when a throttling controller asks to, and stops at the first block.
pub struct FlowSlot {
    manager: Arc<RuleManager>,
    storage: Arc<NodeStorage>,
}

impl FlowSlot {
    pub fn new(manager: Arc<RuleManager>, storage: Arc<NodeStorage>) -> Self {
        FlowSlot { manager, storage }
    }

    /// the node of the statistics the rule limits,
    /// `None` if the rule does not apply to the caller of this entry
    fn select_node(
        &self,
        rule: &Rule,
        tcs: &[Arc<Controller>],
        ctx: &EntryContext,
    ) -> Option<Arc<dyn StatNode>> {
        let origin = ctx.origin();
        if rule.is_default_origin() {
            if rule.relation_strategy == RelationStrategy::CurrentResource {
                return ctx.stat_node();
            }
            return self.select_reference_node(rule, ctx);
        }
        let origin_matched = if rule.is_other_origin() {
            !origin.is_empty() && !tcs.iter().any(|tc| tc.rule().limit_origin == origin)
        } else {
            rule.limit_origin == origin
        };
        if !origin_matched {
            return None;
        }
        if rule.relation_strategy == RelationStrategy::CurrentResource {
            return ctx
                .origin_node()
                .map(|node| node.clone() as Arc<dyn StatNode>);
        }
        self.select_reference_node(rule, ctx)
    }

    fn select_reference_node(&self, rule: &Rule, ctx: &EntryContext) -> Option<Arc<dyn StatNode>> {
        match rule.relation_strategy {
            RelationStrategy::AssociatedResource => self
                .storage
                .get_cluster_node(&rule.ref_resource)
                .map(|node| node.stat() as Arc<dyn StatNode>),
            RelationStrategy::ChainedResource => {
                if ctx.context_name() != rule.ref_resource {
                    return None;
                }
                ctx.default_node()
                    .map(|node| node.stat() as Arc<dyn StatNode>)
            }
            RelationStrategy::CurrentResource => ctx.stat_node(),
        }
    }
}

impl BaseSlot for FlowSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl Slot for FlowSlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        let snapshot = self.manager.snapshot();
        let tcs = snapshot.controllers_of(ctx.resource().name());
        let input = ctx.input();
        for tc in tcs {
            let node = self.select_node(tc.rule(), tcs, ctx);
            if node.is_none() {
                logging::debug!(
                    "[FlowSlot] No statistic node for flow rule {}, resource {}",
                    tc.rule().id,
                    ctx.resource().name()
                );
                continue;
            }
            match tc.perform_checking(node.as_ref(), input.batch_count(), input.flag()) {
                TokenResult::Pass => {}
                TokenResult::Wait(nanos_to_wait) => utils::sleep_for_ns(nanos_to_wait),
                r @ TokenResult::Blocked(_) => return r,
            }
        }
        TokenResult::new_pass()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{
        BlockType, ConcurrencyStat, Context, MetricEvent, ResourceType, ResourceWrapper,
        SentinelRule, TrafficType, WriteStat,
    };

    struct Fixture {
        storage: Arc<NodeStorage>,
        manager: Arc<RuleManager>,
        slot: FlowSlot,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = Arc::new(NodeStorage::default());
            let manager = Arc::new(RuleManager::new());
            let slot = FlowSlot::new(manager.clone(), storage.clone());
            Fixture {
                storage,
                manager,
                slot,
            }
        }

        /// an entry context as prepared by the node selector and cluster builder slots
        fn ctx(&self, res_name: &str, context_name: &str, origin: &str) -> EntryContext {
            let res = ResourceWrapper::new(res_name.into(), ResourceType::Common, TrafficType::Inbound);
            let entrance = self
                .storage
                .get_or_create_entrance_node(context_name)
                .unwrap();
            let context = Arc::new(Context::new(context_name.into(), origin.into(), entrance));
            let cluster = self.storage.get_or_create_cluster_node(&res).unwrap();
            let default = self
                .storage
                .get_or_create_default_node(context_name, &res)
                .unwrap();
            let mut ctx = EntryContext::new();
            if !origin.is_empty() {
                ctx.set_origin_node(cluster.get_or_create_origin_node(origin).unwrap());
            }
            ctx.set_cluster_node(cluster);
            ctx.set_default_node(default);
            ctx.set_context(context);
            ctx.set_resource(res);
            ctx
        }
    }

    fn qps_rule(res: &str, threshold: f64) -> Rule {
        Rule {
            resource: res.into(),
            threshold,
            ..Default::default()
        }
    }

    #[test]
    fn no_rules() {
        let f = Fixture::new();
        let mut ctx = f.ctx("abc", "ctx", "");
        assert!(f.slot.entry(&mut ctx).is_pass());
    }

    #[test]
    fn current_resource() {
        let f = Fixture::new();
        f.manager
            .load_rules(vec![Arc::new(qps_rule("abc", 2.0))])
            .unwrap();
        let mut ctx = f.ctx("abc", "ctx", "");
        assert!(f.slot.entry(&mut ctx).is_pass());
        ctx.cluster_node().unwrap().stat().add_count(MetricEvent::Pass, 2);
        let result = f.slot.entry(&mut ctx);
        assert!(result.is_blocked());
        let err = result.block_err().unwrap();
        assert_eq!(BlockType::Flow, err.block_type());
        assert_eq!("abc", err.triggered_rule().unwrap().resource_name());
    }

    #[test]
    fn specific_and_other_origin() {
        let f = Fixture::new();
        f.manager
            .load_rules(vec![
                Arc::new(Rule {
                    limit_origin: "app-a".into(),
                    ..qps_rule("abc", 1.0)
                }),
                Arc::new(Rule {
                    limit_origin: LIMIT_ORIGIN_OTHER.into(),
                    ..qps_rule("abc", 3.0)
                }),
            ])
            .unwrap();

        let mut ctx_a = f.ctx("abc", "ctx", "app-a");
        ctx_a.origin_node().unwrap().add_count(MetricEvent::Pass, 1);
        assert!(f.slot.entry(&mut ctx_a).is_blocked());

        // app-b is limited by the "other" rule with its own origin node
        let mut ctx_b = f.ctx("abc", "ctx", "app-b");
        ctx_b.origin_node().unwrap().add_count(MetricEvent::Pass, 2);
        assert!(f.slot.entry(&mut ctx_b).is_pass());
        ctx_b.origin_node().unwrap().add_count(MetricEvent::Pass, 1);
        assert!(f.slot.entry(&mut ctx_b).is_blocked());

        // unknown callers are not limited by origin rules
        let mut ctx_anonymous = f.ctx("abc", "ctx", "");
        assert!(f.slot.entry(&mut ctx_anonymous).is_pass());
    }

    #[test]
    fn associated_resource() {
        let f = Fixture::new();
        f.manager
            .load_rules(vec![Arc::new(Rule {
                relation_strategy: RelationStrategy::AssociatedResource,
                ref_resource: "write_db".into(),
                ..qps_rule("read_db", 1.0)
            })])
            .unwrap();
        let mut ctx = f.ctx("read_db", "ctx", "");
        // the associated resource has no statistics yet
        assert!(f.slot.entry(&mut ctx).is_pass());

        let write_ctx = f.ctx("write_db", "ctx", "");
        write_ctx
            .cluster_node()
            .unwrap()
            .stat()
            .add_count(MetricEvent::Pass, 5);
        assert!(f.slot.entry(&mut ctx).is_blocked());
    }

    #[test]
    fn chained_resource() {
        let f = Fixture::new();
        f.manager
            .load_rules(vec![Arc::new(Rule {
                relation_strategy: RelationStrategy::ChainedResource,
                ref_resource: "entrance_a".into(),
                ..qps_rule("abc", 1.0)
            })])
            .unwrap();
        let mut ctx_a = f.ctx("abc", "entrance_a", "");
        let mut ctx_b = f.ctx("abc", "entrance_b", "");
        ctx_a.default_node().unwrap().stat().add_count(MetricEvent::Pass, 1);
        ctx_b.default_node().unwrap().stat().add_count(MetricEvent::Pass, 1);
        assert!(f.slot.entry(&mut ctx_a).is_blocked());
        assert!(f.slot.entry(&mut ctx_b).is_pass());
    }

    #[test]
    fn concurrency() {
        let f = Fixture::new();
        f.manager
            .load_rules(vec![Arc::new(Rule {
                metric_type: MetricType::Concurrency,
                ..qps_rule("abc", 1.0)
            })])
            .unwrap();
        let mut ctx = f.ctx("abc", "ctx", "");
        assert!(f.slot.entry(&mut ctx).is_pass());
        ctx.cluster_node().unwrap().stat().increase_concurrency();
        assert!(f.slot.entry(&mut ctx).is_blocked());
    }

    #[test]
    fn throttling_waits() {
        let f = Fixture::new();
        f.manager
            .load_rules(vec![Arc::new(Rule {
                control_strategy: ControlStrategy::Throttling,
                max_queueing_time_ms: 500,
                ..qps_rule("abc", 10.0)
            })])
            .unwrap();
        let mut ctx = f.ctx("abc", "ctx", "");
        let start = utils::curr_time_millis();
        assert!(f.slot.entry(&mut ctx).is_pass());
        // the second one waits about 100 ms for its turn
        assert!(f.slot.entry(&mut ctx).is_pass());
        assert!(utils::curr_time_millis() - start >= 80);
    }
}
