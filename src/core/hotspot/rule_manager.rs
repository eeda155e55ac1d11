use super::*;
use crate::{base::SentinelRule, logging, utils, Error, Result};
use arc_swap::ArcSwap;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// ControllerGenfn represents the Traffic Controller generator function of a specific control behavior.
/// The metric is given when the statistics of a previous controller are reused.
pub type ControllerGenfn =
    dyn Send + Sync + Fn(Arc<Rule>, Option<Arc<ParamsMetric>>) -> Arc<Controller>;

pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<ControlStrategy, Box<ControllerGenfn>>> = {
        let mut gen_fun_map: HashMap<ControlStrategy, Box<ControllerGenfn>> = HashMap::new();
        gen_fun_map.insert(ControlStrategy::Reject, Box::new(gen_reject));
        gen_fun_map.insert(ControlStrategy::Throttling, Box::new(gen_throttling));
        RwLock::new(gen_fun_map)
    };
    static ref DEFAULT_RULE_MANAGER: Arc<RuleManager> = Arc::new(RuleManager::new());
}

pub(crate) fn gen_reject(rule: Arc<Rule>, metric: Option<Arc<ParamsMetric>>) -> Arc<Controller> {
    let metric = metric.unwrap_or_else(|| Arc::new(ParamsMetric::new(&rule)));
    Arc::new(Controller::new(rule, metric, Arc::new(RejectChecker::new())))
}

pub(crate) fn gen_throttling(
    rule: Arc<Rule>,
    metric: Option<Arc<ParamsMetric>>,
) -> Arc<Controller> {
    let metric = metric.unwrap_or_else(|| Arc::new(ParamsMetric::new(&rule)));
    Arc::new(Controller::new(
        rule,
        metric,
        Arc::new(ThrottlingChecker::new()),
    ))
}

/// the rule manager used by the global slot chain and the free functions of this module
pub fn default_rule_manager() -> Arc<RuleManager> {
    DEFAULT_RULE_MANAGER.clone()
}

/// An immutable view of the loaded hotspot rules and their controllers.
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

/// RuleManager holds the hotspot param flow rules and their controllers,
/// published as a whole through an atomic snapshot.
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

    /// `load_rules` replaces all the previous rules with the given ones.
    /// It returns `Ok(false)` if the rules are the same with the current ones,
    /// and an error, without touching the current rules, if any of them is invalid.
    pub fn load_rules(&self, rules: Vec<Arc<Rule>>) -> Result<bool> {
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        if current.rules == rules {
            logging::info!(
                "[HotspotRuleManager] Load rules is the same with current rules, so ignore load operation."
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
            logging::info!("[HotspotRuleManager] Load resource level rules is the same with current resource level rules, so ignore load operation.");
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

    pub fn get_traffic_controller_list_for(&self, res: &str) -> Vec<Arc<Controller>> {
        self.snapshot.load().controllers_of(res).to_vec()
    }

    pub fn clear_rules(&self) {
        let _guard = self.update_lock.lock().unwrap();
        self.snapshot.store(Arc::new(RuleSnapshot::default()));
        logging::info!("[HotspotRuleManager] Hotspot param flow rules were cleared");
    }

    fn publish(&self, current: &RuleSnapshot, rules: Vec<Arc<Rule>>) -> Result<()> {
        for rule in &rules {
            if let Err(err) = rule.is_valid() {
                logging::warn!(
                    "[HotspotRuleManager] Invalid hotspot param flow rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                return Err(Error::msg(format!(
                    "invalid hotspot param flow rule {}: {}",
                    rule.id, err
                )));
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
        if snapshot.rules.is_empty() {
            logging::info!("[HotspotRuleManager] Hotspot param flow rules were cleared");
        } else {
            logging::info!(
                "[HotspotRuleManager] Hotspot param flow rules were loaded: {:?}",
                snapshot.rules
            );
        }
        self.snapshot.store(Arc::new(snapshot));
        logging::debug!(
            "[HotspotRuleManager] Time statistic(ns) for updating hotspot param flow rule, time cost {}",
            utils::curr_time_nanos() - start
        );
        Ok(())
    }
}

/// An equal rule keeps its controller, a stat reusable rule keeps the parameter statistics.
fn build_traffic_shaping_controller(
    rule: &Arc<Rule>,
    old_tcs: &[Arc<Controller>],
    new_tcs: &[Arc<Controller>],
) -> Result<Arc<Controller>> {
    let unused = |tc: &&Arc<Controller>| !new_tcs.iter().any(|used| Arc::ptr_eq(used, tc));
    if let Some(tc) = old_tcs.iter().filter(unused).find(|tc| tc.rule() == rule) {
        return Ok(Arc::clone(tc));
    }
    let reused_metric = old_tcs
        .iter()
        .filter(unused)
        .find(|tc| tc.rule().is_stat_reusable(rule))
        .map(|tc| Arc::clone(tc.metric()));

    let gen_fun_map = GEN_FUN_MAP.read().unwrap();
    match gen_fun_map.get(&rule.control_strategy) {
        Some(generator) => Ok(generator(Arc::clone(rule), reused_metric)),
        None => Err(Error::msg(format!(
            "unsupported hotspot control strategy: {:?}",
            rule.control_strategy
        ))),
    }
}

/// `load_rules` loads the given hotspot param flow rules to the default rule manager, while all previous rules will be replaced.
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

pub fn clear_rules() {
    DEFAULT_RULE_MANAGER.clear_rules()
}

/// `set_traffic_shaping_generator` sets the traffic controller generator for the given ControlStrategy.
/// Note that modifying the generator of default control strategy is not allowed.
pub fn set_traffic_shaping_generator(
    control_strategy: ControlStrategy,
    generator: Box<ControllerGenfn>,
) -> Result<()> {
    match control_strategy {
        ControlStrategy::Custom(_) => {
            GEN_FUN_MAP
                .write()
                .unwrap()
                .insert(control_strategy, generator);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default control behaviors are not allowed to be modified.",
        )),
    }
}

pub fn remove_traffic_shaping_generator(control_strategy: ControlStrategy) -> Result<()> {
    match control_strategy {
        ControlStrategy::Custom(_) => {
            GEN_FUN_MAP.write().unwrap().remove(&control_strategy);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default control behaviors are not allowed to be removed.",
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rule(res: &str, threshold: u64) -> Arc<Rule> {
        Arc::new(Rule {
            resource: res.into(),
            metric_type: MetricType::QPS,
            duration_in_sec: 1,
            threshold,
            ..Default::default()
        })
    }

    #[test]
    fn load_and_get() {
        let manager = RuleManager::new();
        assert!(manager
            .load_rules(vec![rule("abc", 1), rule("abc", 2), rule("def", 3)])
            .unwrap());
        assert_eq!(3, manager.get_rules().len());
        assert_eq!(2, manager.get_rules_of_resource("abc").len());
        assert_eq!(1, manager.get_traffic_controller_list_for("def").len());
        assert!(!manager
            .load_rules(vec![rule("abc", 1), rule("abc", 2), rule("def", 3)])
            .unwrap());
        manager.clear_rules();
        assert!(manager.get_rules().is_empty());
    }

    #[test]
    fn readers_see_whole_rule_sets() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let manager = Arc::new(RuleManager::new());
        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let manager = manager.clone();
                let done = done.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        let snapshot = manager.snapshot();
                        let seen: Vec<u64> = snapshot
                            .controllers_of("abc")
                            .iter()
                            .map(|tc| tc.rule().threshold)
                            .chain(snapshot.rules().iter().map(|r| r.threshold))
                            .collect();
                        assert!(seen.windows(2).all(|w| w[0] == w[1]), "{:?}", seen);
                        let rules = manager.get_rules();
                        assert!(
                            rules.windows(2).all(|w| w[0].threshold == w[1].threshold),
                            "{:?}",
                            rules
                        );
                    }
                })
            })
            .collect();
        for i in 0..300 {
            let threshold = i % 2 + 1;
            manager
                .load_rules(vec![rule("abc", threshold), rule("def", threshold), rule("ghi", threshold)])
                .unwrap();
        }
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn invalid_rules_keep_old_ones() {
        let manager = RuleManager::new();
        manager.load_rules(vec![rule("abc", 1)]).unwrap();
        let invalid = Arc::new(Rule {
            resource: "def".into(),
            metric_type: MetricType::QPS,
            duration_in_sec: 0,
            ..Default::default()
        });
        let err = manager
            .load_rules(vec![rule("abc", 2), invalid])
            .unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
        assert_eq!(1, manager.get_rules()[0].threshold);
    }

    #[test]
    fn reuse_controller_and_metric() {
        let manager = RuleManager::new();
        manager.load_rules(vec![rule("abc", 1)]).unwrap();
        let old_tc = manager.get_traffic_controller_list_for("abc")[0].clone();

        manager
            .load_rules(vec![rule("abc", 1), rule("def", 1)])
            .unwrap();
        let tc = manager.get_traffic_controller_list_for("abc")[0].clone();
        assert!(Arc::ptr_eq(&old_tc, &tc));

        // a new threshold keeps the statistics of the parameters
        manager.load_rules(vec![rule("abc", 5)]).unwrap();
        let tc = manager.get_traffic_controller_list_for("abc")[0].clone();
        assert!(!Arc::ptr_eq(&old_tc, &tc));
        assert!(Arc::ptr_eq(old_tc.metric(), tc.metric()));

        // a new duration does not
        manager
            .load_rules(vec![Arc::new(Rule {
                duration_in_sec: 2,
                ..(*rule("abc", 5)).clone()
            })])
            .unwrap();
        let new_tc = manager.get_traffic_controller_list_for("abc")[0].clone();
        assert!(!Arc::ptr_eq(tc.metric(), new_tc.metric()));
    }

    #[test]
    fn rules_of_resource() {
        let manager = RuleManager::new();
        manager
            .load_rules(vec![rule("abc", 1), rule("def", 1)])
            .unwrap();
        assert!(manager
            .load_rules_of_resource("abc", vec![rule("def", 2)])
            .is_err());
        assert!(manager
            .load_rules_of_resource("abc", vec![rule("abc", 2)])
            .unwrap());
        assert_eq!(2, manager.get_rules_of_resource("abc")[0].threshold);
        assert!(manager.load_rules_of_resource("abc", vec![]).unwrap());
        assert!(manager.get_rules_of_resource("abc").is_empty());
        assert_eq!(1, manager.get_rules().len());
    }

    #[test]
    fn custom_generator() {
        assert!(set_traffic_shaping_generator(ControlStrategy::Reject, Box::new(gen_reject)).is_err());
        assert!(remove_traffic_shaping_generator(ControlStrategy::Throttling).is_err());

        let manager = RuleManager::new();
        let custom = Arc::new(Rule {
            control_strategy: ControlStrategy::Custom(7),
            ..(*rule("abc", 1)).clone()
        });
        assert!(manager.load_rules(vec![custom.clone()]).is_err());
        set_traffic_shaping_generator(ControlStrategy::Custom(7), Box::new(gen_throttling)).unwrap();
        assert!(manager.load_rules(vec![custom]).unwrap());
        remove_traffic_shaping_generator(ControlStrategy::Custom(7)).unwrap();
    }
}
