use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, Slot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 9000;
const BLOCK_MSG: &str = "circuit breaker check blocked";

lazy_static! {
    pub static ref DEFAULT_DEGRADE_SLOT: Arc<DegradeSlot> =
        Arc::new(DegradeSlot::new(default_rule_manager()));
}

pub fn default_degrade_slot() -> Arc<DegradeSlot> {
    DEFAULT_DEGRADE_SLOT.clone()
}

/// DegradeSlot asks every circuit breaker of the resource for permission,
/// and reports the response time and the error of the passed calls back to them on exit.
pub struct DegradeSlot {
    manager: Arc<RuleManager>,
}

impl DegradeSlot {
    pub fn new(manager: Arc<RuleManager>) -> Self {
        DegradeSlot { manager }
    }
}

impl BaseSlot for DegradeSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl Slot for DegradeSlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        let snapshot = self.manager.snapshot();
        for breaker in snapshot.breakers_of(ctx.resource().name()) {
            if !breaker.try_pass(ctx) {
                return TokenResult::new_blocked_with_cause(
                    BlockType::Degrade,
                    BLOCK_MSG.into(),
                    breaker.bound_rule().clone(),
                    Arc::new(breaker.current_state()),
                );
            }
        }
        TokenResult::new_pass()
    }

    fn exit(&self, ctx: &mut EntryContext) {
        if ctx.is_blocked() {
            return;
        }
        let snapshot = self.manager.snapshot();
        let rt = ctx.round_trip();
        for breaker in snapshot.breakers_of(ctx.resource().name()) {
            let trial = breaker.breaker().is_trial(ctx);
            breaker.on_request_complete(rt, ctx.get_err(), trial);
        }
    }
}
