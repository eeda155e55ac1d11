//! Traffic Shaping Policy

/// Direct calculator and reject checker
pub mod direct;
/// Throttling checker
pub mod throttling;
/// Warm Up calculator
pub mod warmup;

pub use direct::*;
pub use throttling::*;
pub use warmup::*;

use super::Rule;
use crate::base::{StatNode, TokenResult};
use std::fmt;
use std::sync::Arc;

/// Traffic Shaping `Calculator` calculates the actual traffic shaping threshold
/// based on the threshold of rule and the traffic shaping strategy.
pub trait Calculator: Send + Sync + fmt::Debug {
    fn calculate_allowed_threshold(
        &self,
        stat_node: Option<&Arc<dyn StatNode>>,
        batch_count: u32,
        flag: i32,
    ) -> f64;
}

/// Traffic Shaping `Checker` performs checking according to current metrics and the traffic
/// shaping strategy, then yield the token result.
pub trait Checker: Send + Sync + fmt::Debug {
    fn do_check(
        &self,
        stat_node: Option<&Arc<dyn StatNode>>,
        batch_count: u32,
        threshold: f64,
    ) -> TokenResult;
}

/// Controller binds a rule to its calculator and checker.
/// The calculator and the checker keep their own state (tokens, last passed time),
/// so a controller is reused across rule reloads as long as its rule is unchanged.
#[derive(Debug)]
pub struct Controller {
    rule: Arc<Rule>,
    calculator: Arc<dyn Calculator>,
    checker: Arc<dyn Checker>,
}

impl Controller {
    pub fn new(rule: Arc<Rule>, calculator: Arc<dyn Calculator>, checker: Arc<dyn Checker>) -> Self {
        Controller {
            rule,
            calculator,
            checker,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn calculator(&self) -> &Arc<dyn Calculator> {
        &self.calculator
    }

    pub fn checker(&self) -> &Arc<dyn Checker> {
        &self.checker
    }

    pub fn perform_checking(
        &self,
        stat_node: Option<&Arc<dyn StatNode>>,
        batch_count: u32,
        flag: i32,
    ) -> TokenResult {
        let allowed_threshold = self
            .calculator
            .calculate_allowed_threshold(stat_node, batch_count, flag);
        self.checker
            .do_check(stat_node, batch_count, allowed_threshold)
    }
}
