use super::*;
use crate::{
    base::{BaseSlot, EntryContext, Slot, TokenResult},
    utils, Result,
};
use lazy_static::lazy_static;
use std::sync::{atomic::Ordering, Arc};

const RULE_CHECK_SLOT_ORDER: u32 = 5000;

lazy_static! {
    pub static ref DEFAULT_PARAM_FLOW_SLOT: Arc<ParamFlowSlot> =
        Arc::new(ParamFlowSlot::new(default_rule_manager()));
}

pub fn default_param_flow_slot() -> Arc<ParamFlowSlot> {
    DEFAULT_PARAM_FLOW_SLOT.clone()
}

/// ParamFlowSlot limits the calls per value of a parameter of the entry.
/// An in-flight slot taken by a concurrency rule is released when the entry exits.
pub struct ParamFlowSlot {
    manager: Arc<RuleManager>,
}

impl ParamFlowSlot {
    pub fn new(manager: Arc<RuleManager>) -> Self {
        ParamFlowSlot { manager }
    }
}

impl BaseSlot for ParamFlowSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl Slot for ParamFlowSlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        let snapshot = self.manager.snapshot();
        let batch = ctx.input().batch_count();
        for tc in snapshot.controllers_of(ctx.resource().name()) {
            let arg = match tc.extract_args(ctx) {
                Some(arg) => arg,
                None => continue,
            };
            match tc.rule().metric_type {
                MetricType::Concurrency => match tc.acquire_concurrency(&arg) {
                    Ok(concurrency) => ctx.when_exit(Box::new(move |_: &EntryContext| -> Result<()> {
                        concurrency.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })),
                    Err(blocked) => return blocked,
                },
                MetricType::QPS => match tc.perform_checking(&arg, batch) {
                    TokenResult::Pass => {}
                    TokenResult::Wait(nanos_to_wait) => utils::sleep_for_ns(nanos_to_wait),
                    r @ TokenResult::Blocked(_) => return r,
                },
            }
        }
        TokenResult::new_pass()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{BlockType, ResourceType, ResourceWrapper, SentinelInput, SlotChain, TrafficType};

    fn new_ctx(res: &str, args: Vec<&str>) -> EntryContext {
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            res.into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        let mut input = SentinelInput::new(1, 0);
        input.set_args(args.into_iter().map(String::from).collect());
        ctx.set_input(input);
        ctx
    }

    #[test]
    fn qps_per_value() {
        let manager = Arc::new(RuleManager::new());
        manager
            .load_rules(vec![Arc::new(Rule {
                resource: "abc".into(),
                metric_type: MetricType::QPS,
                threshold: 2,
                duration_in_sec: 1,
                param_index: 0,
                ..Default::default()
            })])
            .unwrap();
        let slot = ParamFlowSlot::new(manager);
        for _ in 0..2 {
            assert!(slot.entry(&mut new_ctx("abc", vec!["hot"])).is_pass());
        }
        let result = slot.entry(&mut new_ctx("abc", vec!["hot"]));
        assert_eq!(BlockType::ParamFlow, result.block_err().unwrap().block_type());
        assert!(slot.entry(&mut new_ctx("abc", vec!["cold"])).is_pass());
        // no argument to limit
        assert!(slot.entry(&mut new_ctx("abc", vec![])).is_pass());
        assert!(slot.entry(&mut new_ctx("def", vec!["hot"])).is_pass());
    }

    #[test]
    fn concurrency_released_on_exit() {
        let manager = Arc::new(RuleManager::new());
        manager
            .load_rules(vec![Arc::new(Rule {
                resource: "abc".into(),
                metric_type: MetricType::Concurrency,
                threshold: 1,
                param_index: 0,
                ..Default::default()
            })])
            .unwrap();
        let mut sc = SlotChain::new();
        sc.add_slot(Arc::new(ParamFlowSlot::new(manager)));

        let mut first = new_ctx("abc", vec!["hot"]);
        assert!(sc.entry(&mut first).is_pass());
        let mut second = new_ctx("abc", vec!["hot"]);
        assert!(sc.entry(&mut second).is_blocked());
        sc.exit(&mut second);

        sc.exit(&mut first);
        let mut third = new_ctx("abc", vec!["hot"]);
        assert!(sc.entry(&mut third).is_pass());
        sc.exit(&mut third);
    }
}
