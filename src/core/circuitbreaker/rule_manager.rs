use super::*;
use crate::{base::SentinelRule, logging, utils, Error, Result};
use arc_swap::ArcSwap;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

/// BreakerGenFn generates a circuit breaker for the rule,
/// reusing the statistic of a previous breaker when one is given
pub type BreakerGenFn = dyn Send
    + Sync
    + Fn(Arc<Rule>, Option<Arc<CounterLeapArray>>) -> Result<Arc<dyn CircuitBreakerTrait>>;

pub type BreakerMap = HashMap<String, Vec<Arc<dyn CircuitBreakerTrait>>>;

macro_rules! insert_breaker_generator {
    ($map:expr, $strategy:expr, $breaker_struct:ident) => {
        $map.insert(
            $strategy,
            Box::new(
                |rule: Arc<Rule>,
                 stat: Option<Arc<CounterLeapArray>>|
                 -> Result<Arc<dyn CircuitBreakerTrait>> {
                    let breaker: Arc<dyn CircuitBreakerTrait> = match stat {
                        Some(stat) => Arc::new($breaker_struct::new_with_stat(rule, stat)),
                        None => Arc::new($breaker_struct::new(rule)?),
                    };
                    Ok(breaker)
                },
            ),
        );
    };
}

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<BreakerStrategy, Box<BreakerGenFn>>> = {
        let mut gen_fun_map: HashMap<BreakerStrategy, Box<BreakerGenFn>> = HashMap::new();
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::SlowRequestRatio, SlowRtBreaker);
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::AverageRt, AverageRtBreaker);
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::ErrorRatio, ErrorRatioBreaker);
        insert_breaker_generator!(gen_fun_map, BreakerStrategy::ErrorCount, ErrorCountBreaker);
        RwLock::new(gen_fun_map)
    };
    static ref STATE_CHANGE_LISTENERS: RwLock<Vec<Arc<dyn StateChangeListener>>> =
        RwLock::new(Vec::new());
    static ref DEFAULT_RULE_MANAGER: Arc<RuleManager> = Arc::new(RuleManager::new());
}

/// the rule manager used by the global slot chain and the free functions of this module
pub fn default_rule_manager() -> Arc<RuleManager> {
    DEFAULT_RULE_MANAGER.clone()
}

pub fn state_change_listeners() -> RwLockReadGuard<'static, Vec<Arc<dyn StateChangeListener>>> {
    STATE_CHANGE_LISTENERS.read().unwrap()
}

/// `register_state_change_listeners` registers the global state change listeners,
/// they are notified by the breakers of every rule manager
pub fn register_state_change_listeners(mut listeners: Vec<Arc<dyn StateChangeListener>>) {
    if listeners.is_empty() {
        return;
    }
    STATE_CHANGE_LISTENERS.write().unwrap().append(&mut listeners);
}

pub fn clear_state_change_listeners() {
    STATE_CHANGE_LISTENERS.write().unwrap().clear();
}

/// An immutable view of the loaded rules and the breakers built from them.
#[derive(Default)]
pub struct RuleSnapshot {
    rules: Vec<Arc<Rule>>,
    breakers: BreakerMap,
}

impl RuleSnapshot {
    pub fn rules(&self) -> &Vec<Arc<Rule>> {
        &self.rules
    }

    pub fn breakers_of(&self, res: &str) -> &[Arc<dyn CircuitBreakerTrait>] {
        self.breakers
            .get(res)
            .map(|cbs| cbs.as_slice())
            .unwrap_or(&[])
    }
}

/// RuleManager holds the circuit breaking rules and their breakers.
/// A rule update publishes a complete new snapshot at once.
pub struct RuleManager {
    snapshot: ArcSwap<RuleSnapshot>,
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

    /// `load_rules` replaces all the previous rules with the given circuit breaking rules.
    /// It returns `Ok(false)` if the rules are the same with the current ones,
    /// and an error, without touching the current rules, if any of them is invalid.
    pub fn load_rules(&self, rules: Vec<Arc<Rule>>) -> Result<bool> {
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        if current.rules == rules {
            logging::info!(
                "[CircuitBreakerRuleManager] Load rules is the same with current rules, so ignore load operation."
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
            logging::info!("[CircuitBreakerRuleManager] Load resource level rules is the same with current resource level rules, so ignore load operation.");
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
            .breakers_of(res)
            .iter()
            .map(|cb| Arc::clone(cb.bound_rule()))
            .collect()
    }

    pub fn clear_rules(&self) {
        let _guard = self.update_lock.lock().unwrap();
        self.snapshot.store(Arc::new(RuleSnapshot::default()));
        logging::info!("[CircuitBreakerRuleManager] Circuit breaking rules were cleared");
    }

    pub fn get_breakers_of_resource(&self, res: &str) -> Vec<Arc<dyn CircuitBreakerTrait>> {
        self.snapshot.load().breakers_of(res).to_vec()
    }

    fn publish(&self, current: &RuleSnapshot, rules: Vec<Arc<Rule>>) -> Result<()> {
        for rule in &rules {
            if let Err(err) = rule.is_valid() {
                logging::warn!(
                    "[CircuitBreakerRuleManager] Invalid circuit breaking rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                return Err(Error::msg(format!(
                    "invalid circuit breaking rule {}: {}",
                    rule.id, err
                )));
            }
        }
        let start = utils::curr_time_nanos();
        let mut breakers = BreakerMap::with_capacity(rules.len());
        for rule in &rules {
            let old_cbs = current.breakers_of(&rule.resource);
            let new_cbs = breakers.entry(rule.resource.clone()).or_default();
            let cb = build_circuit_breaker(rule, old_cbs, new_cbs)?;
            new_cbs.push(cb);
        }
        let snapshot = RuleSnapshot { rules, breakers };
        if snapshot.rules.is_empty() {
            logging::info!("[CircuitBreakerRuleManager] Circuit breaking rules were cleared");
        } else {
            logging::info!(
                "[CircuitBreakerRuleManager] Circuit breaking rules were loaded: {:?}",
                snapshot.rules
            );
        }
        self.snapshot.store(Arc::new(snapshot));
        logging::debug!(
            "[CircuitBreakerRuleManager] Time statistic(ns) for updating circuit breaker rule, time cost {}",
            utils::curr_time_nanos() - start
        );
        Ok(())
    }
}

/// An equal rule keeps its breaker with its state,
/// a rule with the same statistic settings keeps the statistic only.
fn build_circuit_breaker(
    rule: &Arc<Rule>,
    old_cbs: &[Arc<dyn CircuitBreakerTrait>],
    new_cbs: &[Arc<dyn CircuitBreakerTrait>],
) -> Result<Arc<dyn CircuitBreakerTrait>> {
    let unused = |cb: &&Arc<dyn CircuitBreakerTrait>| {
        !new_cbs.iter().any(|used| Arc::ptr_eq(used, cb))
    };
    if let Some(cb) = old_cbs
        .iter()
        .filter(unused)
        .find(|cb| cb.bound_rule() == rule)
    {
        return Ok(Arc::clone(cb));
    }
    let reused_stat = old_cbs
        .iter()
        .filter(unused)
        .find(|cb| cb.bound_rule().is_stat_reusable(rule))
        .map(|cb| Arc::clone(cb.stat()));

    let gen_fun_map = GEN_FUN_MAP.read().unwrap();
    match gen_fun_map.get(&rule.strategy) {
        Some(generator) => generator(Arc::clone(rule), reused_stat),
        None => Err(Error::msg(format!(
            "unsupported circuit breaker strategy: {:?}",
            rule.strategy
        ))),
    }
}

/// `load_rules` loads the given circuit breaking rules to the default rule manager, while all previous rules will be replaced.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> Result<bool> {
    DEFAULT_RULE_MANAGER.load_rules(rules)
}

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

pub fn get_breakers_of_resource(res: &str) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    DEFAULT_RULE_MANAGER.get_breakers_of_resource(res)
}

pub fn clear_rules() {
    DEFAULT_RULE_MANAGER.clear_rules()
}

/// `set_circuit_breaker_generator` sets the circuit breaker generator for the given custom strategy.
/// Note that modifying the generator of the default strategies is not allowed.
pub fn set_circuit_breaker_generator(
    strategy: BreakerStrategy,
    generator: Box<BreakerGenFn>,
) -> Result<()> {
    match strategy {
        BreakerStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().insert(strategy, generator);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

pub fn remove_circuit_breaker_generator(strategy: &BreakerStrategy) -> Result<()> {
    match strategy {
        BreakerStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().remove(strategy);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be removed.",
        )),
    }
}
