mod command;
mod degrade;
mod flow;
mod hotspot;

use sentinel_guard::{
    api::{build_slot_chain, RuleManagers},
    base::SlotChain,
    stat::NodeStorage,
};
use std::sync::Arc;

/// a slot chain with its own statistics and rules, so that tests do not share state
pub struct Guard {
    pub managers: RuleManagers,
    pub storage: Arc<NodeStorage>,
    pub chain: Arc<SlotChain>,
}

impl Guard {
    pub fn new() -> Self {
        let managers = RuleManagers::new();
        let storage = Arc::new(NodeStorage::default());
        let chain = Arc::new(build_slot_chain(&managers, storage.clone()));
        Guard {
            managers,
            storage,
            chain,
        }
    }
}
