use crate::base::SlotChain;
use crate::log::{default_log_slot, LogSlot};
use crate::stat::{
    default_cluster_builder_slot, default_node_selector_slot, default_stat_slot,
    ClusterBuilderSlot, NodeSelectorSlot, NodeStorage, StatisticSlot,
};
use crate::{authority, circuitbreaker, flow, hotspot, system};
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    static ref GLOBAL_SLOT_CHAIN: Arc<SlotChain> = Arc::new(build_default_slot_chain());
}

/// the slot chain of the process default node storage and rule managers,
/// built once on first use
pub fn global_slot_chain() -> Arc<SlotChain> {
    GLOBAL_SLOT_CHAIN.clone()
}

fn build_default_slot_chain() -> SlotChain {
    let mut sc = SlotChain::new();
    sc.add_slot(default_node_selector_slot());
    sc.add_slot(default_cluster_builder_slot());
    sc.add_slot(default_log_slot());
    sc.add_slot(default_stat_slot());
    sc.add_slot(hotspot::default_param_flow_slot());
    sc.add_slot(system::default_adaptive_slot());
    sc.add_slot(authority::default_authority_slot());
    sc.add_slot(flow::default_flow_slot());
    sc.add_slot(circuitbreaker::default_degrade_slot());
    sc
}

/// RuleManagers groups the rule managers a slot chain consults.
#[derive(Clone)]
pub struct RuleManagers {
    pub flow: Arc<flow::RuleManager>,
    pub circuitbreaker: Arc<circuitbreaker::RuleManager>,
    pub system: Arc<system::RuleManager>,
    pub authority: Arc<authority::RuleManager>,
    pub hotspot: Arc<hotspot::RuleManager>,
}

impl Default for RuleManagers {
    fn default() -> Self {
        RuleManagers {
            flow: Arc::new(flow::RuleManager::new()),
            circuitbreaker: Arc::new(circuitbreaker::RuleManager::new()),
            system: Arc::new(system::RuleManager::new()),
            authority: Arc::new(authority::RuleManager::new()),
            hotspot: Arc::new(hotspot::RuleManager::new()),
        }
    }
}

impl RuleManagers {
    /// empty managers, unrelated to the process default ones
    pub fn new() -> Self {
        Self::default()
    }

    /// the process default managers, which the free `load_rules` functions update
    pub fn global() -> Self {
        RuleManagers {
            flow: flow::default_rule_manager(),
            circuitbreaker: circuitbreaker::default_rule_manager(),
            system: system::default_rule_manager(),
            authority: authority::default_rule_manager(),
            hotspot: hotspot::default_rule_manager(),
        }
    }
}

/// build_slot_chain assembles the full pipeline on the given statistics and rules:
/// NodeSelector, ClusterBuilder, Log, Statistic, ParamFlow, System, Authority, Flow, Degrade.
pub fn build_slot_chain(managers: &RuleManagers, storage: Arc<NodeStorage>) -> SlotChain {
    let mut sc = SlotChain::new();
    sc.add_slot(Arc::new(NodeSelectorSlot::new(storage.clone())));
    sc.add_slot(Arc::new(ClusterBuilderSlot::new(storage.clone())));
    sc.add_slot(Arc::new(LogSlot::new()));
    sc.add_slot(Arc::new(StatisticSlot::new(storage.clone())));
    sc.add_slot(Arc::new(hotspot::ParamFlowSlot::new(
        managers.hotspot.clone(),
    )));
    sc.add_slot(Arc::new(system::AdaptiveSlot::new(
        managers.system.clone(),
        storage.clone(),
        Arc::new(system::BbrEstimator::default()),
    )));
    sc.add_slot(Arc::new(authority::AuthoritySlot::new(
        managers.authority.clone(),
    )));
    sc.add_slot(Arc::new(flow::FlowSlot::new(
        managers.flow.clone(),
        storage,
    )));
    sc.add_slot(Arc::new(circuitbreaker::DegradeSlot::new(
        managers.circuitbreaker.clone(),
    )));
    sc
}
