use super::*;
use crate::{base::SentinelRule, logging, utils, Error, Result};
use arc_swap::ArcSwap;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// ControllerGenfn represents the Traffic Controller generator function of a specific control behavior.
pub type ControllerGenfn = dyn Send + Sync + Fn(Arc<Rule>) -> Result<Arc<Controller>>;

#[derive(Debug, Hash, PartialEq, Eq)]
pub struct ControllerGenKey {
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
}

impl ControllerGenKey {
    pub fn new(calculate_strategy: CalculateStrategy, control_strategy: ControlStrategy) -> Self {
        ControllerGenKey {
            calculate_strategy,
            control_strategy,
        }
    }
}

/// ControllerMap represents the map storage for Controller.
pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;

macro_rules! insert_flow_generator {
    ($map:expr, $calculate_strategy:expr, $control_strategy:expr, $calculator_struct:ident, $checker_struct:ident) => {
        $map.insert(
            ControllerGenKey::new($calculate_strategy, $control_strategy),
            Box::new(|rule: Arc<Rule>| -> Result<Arc<Controller>> {
                let calculator = Arc::new($calculator_struct::new(Arc::clone(&rule)));
                let checker = Arc::new($checker_struct::new(Arc::clone(&rule)));
                Ok(Arc::new(Controller::new(rule, calculator, checker)))
            }),
        );
    };
}

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<ControllerGenKey, Box<ControllerGenfn>>> = {
        let mut gen_fun_map: HashMap<ControllerGenKey, Box<ControllerGenfn>> = HashMap::new();
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::Direct,
            ControlStrategy::Reject,
            DirectCalculator,
            RejectChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::Direct,
            ControlStrategy::Throttling,
            DirectCalculator,
            ThrottlingChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::WarmUp,
            ControlStrategy::Reject,
            WarmUpCalculator,
            RejectChecker
        );
        insert_flow_generator!(
            gen_fun_map,
            CalculateStrategy::WarmUp,
            ControlStrategy::Throttling,
            WarmUpCalculator,
            ThrottlingChecker
        );
        RwLock::new(gen_fun_map)
    };
    static ref DEFAULT_RULE_MANAGER: Arc<RuleManager> = Arc::new(RuleManager::new());
}

/// the rule manager used by the global slot chain and the free functions of this module
pub fn default_rule_manager() -> Arc<RuleManager> {
    DEFAULT_RULE_MANAGER.clone()
}

/// An immutable view of the loaded rules and the controllers built from them.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    rules: Vec<Arc<Rule>>,
    controllers: ControllerMap,
}

impl RuleSnapshot {
    pub fn rules(&self) -> &Vec<Arc<Rule>> {
        &self.rules
    }

    pub fn controllers_of(&self, res: &str) -> &[Arc<Controller>] {
        self.controllers
            .get(res)
            .map(|tcs| tcs.as_slice())
            .unwrap_or(&[])
    }
}

/// RuleManager holds the flow rules and their traffic shaping controllers.
/// Readers load the current snapshot without locking,
/// a rule update builds a complete new snapshot and publishes it at once,
/// so that the slot never observes a partially updated rule set.
pub struct RuleManager {
    snapshot: ArcSwap<RuleSnapshot>,
    /// serializes the writers
    update_lock: Mutex<()>,
}

impl Default for RuleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleManager {
    pub fn new() -> Self {
        RuleManager {
            snapshot: ArcSwap::from_pointee(RuleSnapshot::default()),
            update_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshot.load_full()
    }

    /// `load_rules` replaces all the previous rules with the given ones.
    /// It returns `Ok(false)` if the rules are the same with the current ones,
    /// and an error, without touching the current rules, if any of them is invalid.
    pub fn load_rules(&self, rules: Vec<Arc<Rule>>) -> Result<bool> {
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        if current.rules == rules {
            logging::info!(
                "[FlowRuleManager] Load rules is the same with current rules, so ignore load operation."
            );
            return Ok(false);
        }
        self.publish(&current, rules)?;
        Ok(true)
    }

    /// `load_rules_of_resource` replaces the rules of `res` only,
    /// an empty `rules` clears the rules of `res`.
    pub fn load_rules_of_resource(&self, res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
        if res.is_empty() {
            return Err(Error::msg("empty resource"));
        }
        if let Some(rule) = rules.iter().find(|r| r.resource != res) {
            return Err(Error::msg(format!(
                "unmatched resource name, expect: {}, actual: {}",
                res, rule.resource
            )));
        }
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        let old_rules_of_res: Vec<Arc<Rule>> = current
            .rules
            .iter()
            .filter(|r| r.resource == res)
            .cloned()
            .collect();
        if old_rules_of_res == rules {
            logging::info!("[FlowRuleManager] Load resource level rules is the same with current resource level rules, so ignore load operation.");
            return Ok(false);
        }
        let mut new_rules: Vec<Arc<Rule>> = current
            .rules
            .iter()
            .filter(|r| r.resource != res)
            .cloned()
            .collect();
        new_rules.extend(rules);
        self.publish(&current, new_rules)?;
        Ok(true)
    }

    /// `append_rules` adds the given rules to the current ones,
    /// rules equal to a loaded one are ignored.
    pub fn append_rules(&self, rules: Vec<Arc<Rule>>) -> Result<bool> {
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        let mut new_rules = current.rules.clone();
        for rule in rules {
            if !new_rules.contains(&rule) {
                new_rules.push(rule);
            }
        }
        if new_rules.len() == current.rules.len() {
            return Ok(false);
        }
        self.publish(&current, new_rules)?;
        Ok(true)
    }

    pub fn get_rules(&self) -> Vec<Arc<Rule>> {
        self.snapshot.load().rules.clone()
    }

    pub fn get_rules_of_resource(&self, res: &str) -> Vec<Arc<Rule>> {
        self.snapshot
            .load()
            .controllers_of(res)
            .iter()
            .map(|tc| Arc::clone(tc.rule()))
            .collect()
    }

    pub fn clear_rules(&self) {
        let _guard = self.update_lock.lock().unwrap();
        self.snapshot.store(Arc::new(RuleSnapshot::default()));
        logging::info!("[FlowRuleManager] Flow rules were cleared");
    }

    pub fn get_traffic_controller_list_for(&self, res: &str) -> Vec<Arc<Controller>> {
        self.snapshot.load().controllers_of(res).to_vec()
    }

    /// validate every rule, build the controllers and swap the snapshot,
    /// nothing is published when any step fails
    fn publish(&self, current: &RuleSnapshot, rules: Vec<Arc<Rule>>) -> Result<()> {
        for rule in &rules {
            if let Err(err) = rule.is_valid() {
                logging::warn!(
                    "[FlowRuleManager] Invalid flow rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                return Err(Error::msg(format!("invalid flow rule {}: {}", rule.id, err)));
            }
        }
        let start = utils::curr_time_nanos();
        let mut controllers = ControllerMap::with_capacity(rules.len());
        for rule in &rules {
            let old_tcs = current.controllers_of(&rule.resource);
            let new_tcs = controllers.entry(rule.resource.clone()).or_default();
            let tc = build_traffic_shaping_controller(rule, old_tcs, new_tcs)?;
            new_tcs.push(tc);
        }
        let snapshot = RuleSnapshot { rules, controllers };
        log_rule_update(&snapshot);
        self.snapshot.store(Arc::new(snapshot));
        logging::debug!(
            "[FlowRuleManager] Time statistic(ns) for updating flow rule, time cost {}",
            utils::curr_time_nanos() - start
        );
        Ok(())
    }
}

/// reuse the controller of an equal rule so that the state of throttling and warm up survives reloads
fn build_traffic_shaping_controller(
    rule: &Arc<Rule>,
    old_tcs: &[Arc<Controller>],
    new_tcs: &[Arc<Controller>],
) -> Result<Arc<Controller>> {
    let reusable = old_tcs.iter().find(|tc| {
        tc.rule() == rule && !new_tcs.iter().any(|used| Arc::ptr_eq(used, tc))
    });
    if let Some(tc) = reusable {
        return Ok(Arc::clone(tc));
    }
    let gen_fun_map = GEN_FUN_MAP.read().unwrap();
    match gen_fun_map.get(&ControllerGenKey::new(
        rule.calculate_strategy,
        rule.control_strategy,
    )) {
        Some(generator) => generator(Arc::clone(rule)),
        None => Err(Error::msg(format!(
            "unsupported flow control strategy, calculate_strategy: {:?}, control_strategy: {:?}",
            rule.calculate_strategy, rule.control_strategy
        ))),
    }
}

fn log_rule_update(snapshot: &RuleSnapshot) {
    if snapshot.rules.is_empty() {
        logging::info!("[FlowRuleManager] Flow rules were cleared")
    } else {
        logging::info!(
            "[FlowRuleManager] Flow rules were loaded: {:?}",
            snapshot.rules
        )
    }
}

/// `load_rules` loads the given flow rules to the default rule manager, while all previous rules will be replaced.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> Result<bool> {
    DEFAULT_RULE_MANAGER.load_rules(rules)
}

/// `load_rules_of_resource` replaces the rules of one resource in the default rule manager.
pub fn load_rules_of_resource(res: &str, rules: Vec<Arc<Rule>>) -> Result<bool> {
    DEFAULT_RULE_MANAGER.load_rules_of_resource(res, rules)
}

pub fn append_rules(rules: Vec<Arc<Rule>>) -> Result<bool> {
    DEFAULT_RULE_MANAGER.append_rules(rules)
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    DEFAULT_RULE_MANAGER.get_rules()
}

pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    DEFAULT_RULE_MANAGER.get_rules_of_resource(res)
}

pub fn clear_rules() {
    DEFAULT_RULE_MANAGER.clear_rules()
}

/// `set_traffic_shaping_generator` sets the traffic controller generator for the given CalculateStrategy and ControlStrategy.
/// Note that modifying the generator of default control strategy is not allowed.
pub fn set_traffic_shaping_generator(
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
    generator: Box<ControllerGenfn>,
) -> Result<()> {
    match (calculate_strategy, control_strategy) {
        (CalculateStrategy::Custom(_), _) | (_, ControlStrategy::Custom(_)) => {
            GEN_FUN_MAP.write().unwrap().insert(
                ControllerGenKey::new(calculate_strategy, control_strategy),
                generator,
            );
            Ok(())
        }
        _ => Err(Error::msg(
            "Default control behaviors are not allowed to be modified.",
        )),
    }
}

pub fn remove_traffic_shaping_generator(
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
) -> Result<()> {
    match (calculate_strategy, control_strategy) {
        (CalculateStrategy::Custom(_), _) | (_, ControlStrategy::Custom(_)) => {
            GEN_FUN_MAP
                .write()
                .unwrap()
                .remove(&ControllerGenKey::new(calculate_strategy, control_strategy));
            Ok(())
        }
        _ => Err(Error::msg(
            "Default control behaviors are not allowed to be removed.",
        )),
    }
}
