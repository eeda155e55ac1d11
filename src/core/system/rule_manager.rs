use super::*;
use crate::{base::SentinelRule, logging, Error, Result};
use arc_swap::ArcSwap;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type RuleMap = HashMap<MetricType, Vec<Arc<Rule>>>;

lazy_static! {
    static ref DEFAULT_RULE_MANAGER: Arc<RuleManager> = Arc::new(RuleManager::new());
}

/// the rule manager used by the global slot chain and the free functions of this module
pub fn default_rule_manager() -> Arc<RuleManager> {
    DEFAULT_RULE_MANAGER.clone()
}

/// An immutable view of the loaded system rules.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    rules: Vec<Arc<Rule>>,
    rule_map: RuleMap,
}

impl RuleSnapshot {
    fn new(rules: Vec<Arc<Rule>>) -> Self {
        let mut rule_map = RuleMap::new();
        for rule in &rules {
            rule_map
                .entry(rule.metric_type)
                .or_default()
                .push(Arc::clone(rule));
        }
        RuleSnapshot { rules, rule_map }
    }

    pub fn rules(&self) -> &Vec<Arc<Rule>> {
        &self.rules
    }

    pub fn rules_of(&self, metric_type: MetricType) -> &[Arc<Rule>] {
        self.rule_map
            .get(&metric_type)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }
}

/// RuleManager holds the global system rules, published as a whole through an atomic snapshot.
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

    /// `load_rules` replaces all the previous system rules with the given ones.
    /// It returns `Ok(false)` if the rules are the same with the current ones,
    /// and an error, without touching the current rules, if any of them is invalid.
    pub fn load_rules(&self, rules: Vec<Arc<Rule>>) -> Result<bool> {
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        if current.rules == rules {
            logging::info!(
                "[SystemRuleManager] Load rules is the same with current rules, so ignore load operation."
            );
            return Ok(false);
        }
        self.publish(rules)?;
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
        self.publish(new_rules)?;
        Ok(true)
    }

    pub fn get_rules(&self) -> Vec<Arc<Rule>> {
        self.snapshot.load().rules.clone()
    }

    pub fn clear_rules(&self) {
        let _guard = self.update_lock.lock().unwrap();
        self.snapshot.store(Arc::new(RuleSnapshot::default()));
        logging::info!("[SystemRuleManager] System rules were cleared");
    }

    fn publish(&self, rules: Vec<Arc<Rule>>) -> Result<()> {
        for rule in &rules {
            if let Err(err) = rule.is_valid() {
                logging::warn!(
                    "[SystemRuleManager] Invalid system rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                return Err(Error::msg(format!(
                    "invalid system rule {}: {}",
                    rule.id, err
                )));
            }
        }
        if rules.is_empty() {
            logging::info!("[SystemRuleManager] System rules were cleared");
        } else {
            logging::info!("[SystemRuleManager] System rules were loaded: {:?}", rules);
        }
        self.snapshot.store(Arc::new(RuleSnapshot::new(rules)));
        Ok(())
    }
}

/// `load_rules` loads the given system rules to the default rule manager, while all previous rules will be replaced.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> Result<bool> {
    DEFAULT_RULE_MANAGER.load_rules(rules)
}

pub fn append_rules(rules: Vec<Arc<Rule>>) -> Result<bool> {
    DEFAULT_RULE_MANAGER.append_rules(rules)
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    DEFAULT_RULE_MANAGER.get_rules()
}

pub fn clear_rules() {
    DEFAULT_RULE_MANAGER.clear_rules()
}

#[cfg(test)]
mod test {
    use super::*;

    fn rule(metric_type: MetricType, threshold: f64) -> Arc<Rule> {
        Arc::new(Rule {
            metric_type,
            threshold,
            ..Default::default()
        })
    }

    #[test]
    fn load_and_get() {
        let manager = RuleManager::new();
        assert!(manager
            .load_rules(vec![
                rule(MetricType::InboundQPS, 100.0),
                rule(MetricType::Concurrency, 10.0),
                rule(MetricType::InboundQPS, 200.0),
            ])
            .unwrap());
        assert_eq!(3, manager.get_rules().len());
        let snapshot = manager.snapshot();
        assert_eq!(2, snapshot.rules_of(MetricType::InboundQPS).len());
        assert!(snapshot.rules_of(MetricType::Load).is_empty());
        assert!(!manager
            .load_rules(vec![
                rule(MetricType::InboundQPS, 100.0),
                rule(MetricType::Concurrency, 10.0),
                rule(MetricType::InboundQPS, 200.0),
            ])
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
                        let seen: Vec<f64> = snapshot
                            .rules_of(MetricType::InboundQPS)
                            .iter()
                            .chain(snapshot.rules().iter())
                            .map(|r| r.threshold)
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
            let threshold = (i % 2 + 1) as f64;
            manager
                .load_rules(vec![
                    rule(MetricType::InboundQPS, threshold),
                    rule(MetricType::Concurrency, threshold),
                    rule(MetricType::Load, threshold),
                ])
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
        manager
            .load_rules(vec![rule(MetricType::Concurrency, 10.0)])
            .unwrap();
        assert!(manager
            .load_rules(vec![
                rule(MetricType::InboundQPS, 100.0),
                rule(MetricType::CpuUsage, 200.0),
            ])
            .is_err());
        let rules = manager.get_rules();
        assert_eq!(1, rules.len());
        assert_eq!(MetricType::Concurrency, rules[0].metric_type);
    }

    #[test]
    fn append() {
        let manager = RuleManager::new();
        assert!(manager
            .append_rules(vec![rule(MetricType::AvgRT, 100.0)])
            .unwrap());
        assert!(!manager
            .append_rules(vec![rule(MetricType::AvgRT, 100.0)])
            .unwrap());
        assert!(manager
            .append_rules(vec![rule(MetricType::Load, 4.0)])
            .unwrap());
        assert_eq!(2, manager.get_rules().len());
        assert!(manager
            .append_rules(vec![rule(MetricType::Load, -4.0)])
            .is_err());
        assert_eq!(2, manager.get_rules().len());
    }
}
