use super::*;
use crate::{base::SentinelRule, logging, Error, Result};
use arc_swap::ArcSwap;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type RuleMap = HashMap<String, Vec<Arc<Rule>>>;

lazy_static! {
    static ref DEFAULT_RULE_MANAGER: Arc<RuleManager> = Arc::new(RuleManager::new());
}

/// the rule manager used by the global slot chain and the free functions of this module
pub fn default_rule_manager() -> Arc<RuleManager> {
    DEFAULT_RULE_MANAGER.clone()
}

/// An immutable view of the loaded authority rules.
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
                .entry(rule.resource.clone())
                .or_default()
                .push(Arc::clone(rule));
        }
        RuleSnapshot { rules, rule_map }
    }

    pub fn rules(&self) -> &Vec<Arc<Rule>> {
        &self.rules
    }

    pub fn rules_of(&self, res: &str) -> &[Arc<Rule>] {
        self.rule_map
            .get(res)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }
}

/// RuleManager holds the authority rules, published as a whole through an atomic snapshot.
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

    /// `load_rules` replaces all the previous authority rules with the given ones.
    /// It returns `Ok(false)` if the rules are the same with the current ones,
    /// and an error, without touching the current rules, if any of them is invalid.
    pub fn load_rules(&self, rules: Vec<Arc<Rule>>) -> Result<bool> {
        let _guard = self.update_lock.lock().unwrap();
        let current = self.snapshot.load_full();
        if current.rules == rules {
            logging::info!(
                "[AuthorityRuleManager] Load rules is the same with current rules, so ignore load operation."
            );
            return Ok(false);
        }
        self.publish(rules)?;
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
        if current.rules_of(res) == rules.as_slice() {
            logging::info!("[AuthorityRuleManager] Load resource level rules is the same with current resource level rules, so ignore load operation.");
            return Ok(false);
        }
        let mut new_rules: Vec<Arc<Rule>> = current
            .rules
            .iter()
            .filter(|r| r.resource != res)
            .cloned()
            .collect();
        new_rules.extend(rules);
        self.publish(new_rules)?;
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

    pub fn get_rules_of_resource(&self, res: &str) -> Vec<Arc<Rule>> {
        self.snapshot.load().rules_of(res).to_vec()
    }

    pub fn clear_rules(&self) {
        let _guard = self.update_lock.lock().unwrap();
        self.snapshot.store(Arc::new(RuleSnapshot::default()));
        logging::info!("[AuthorityRuleManager] Authority rules were cleared");
    }

    fn publish(&self, rules: Vec<Arc<Rule>>) -> Result<()> {
        for rule in &rules {
            if let Err(err) = rule.is_valid() {
                logging::warn!(
                    "[AuthorityRuleManager] Invalid authority rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                return Err(Error::msg(format!(
                    "invalid authority rule {}: {}",
                    rule.id, err
                )));
            }
        }
        if rules.is_empty() {
            logging::info!("[AuthorityRuleManager] Authority rules were cleared");
        } else {
            logging::info!(
                "[AuthorityRuleManager] Authority rules were loaded: {:?}",
                rules
            );
        }
        self.snapshot.store(Arc::new(RuleSnapshot::new(rules)));
        Ok(())
    }
}

/// `load_rules` loads the given authority rules to the default rule manager, while all previous rules will be replaced.
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
