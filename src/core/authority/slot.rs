use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, Slot, Snapshot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 7000;

lazy_static! {
    pub static ref DEFAULT_AUTHORITY_SLOT: Arc<AuthoritySlot> =
        Arc::new(AuthoritySlot::new(default_rule_manager()));
}

pub fn default_authority_slot() -> Arc<AuthoritySlot> {
    DEFAULT_AUTHORITY_SLOT.clone()
}

/// AuthoritySlot checks the origin of the call against the white and black lists of the resource.
pub struct AuthoritySlot {
    manager: Arc<RuleManager>,
}

impl AuthoritySlot {
    pub fn new(manager: Arc<RuleManager>) -> Self {
        AuthoritySlot { manager }
    }
}

impl BaseSlot for AuthoritySlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl Slot for AuthoritySlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        let snapshot = self.manager.snapshot();
        let origin = ctx.origin();
        for rule in snapshot.rules_of(ctx.resource().name()) {
            if rule.passes(origin) {
                continue;
            }
            return TokenResult::new_blocked_with_cause(
                BlockType::Authority,
                format!("origin {} is not allowed", origin),
                rule.clone(),
                Arc::new(origin.to_string()) as Arc<Snapshot>,
            );
        }
        TokenResult::new_pass()
    }
}
