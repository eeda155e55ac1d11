pub mod reject;
pub mod throttling;

pub use reject::*;
pub use throttling::*;

use super::*;
use crate::{
    base::{BlockType, EntryContext, ParamKey, Snapshot, TokenResult},
    logging, utils,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Traffic Shaping `Checker` performs checking on the QPS statistics of a parameter value
/// according to the traffic shaping strategy, then yields the token result.
pub trait Checker: Send + Sync + std::fmt::Debug {
    fn do_check(&self, owner: &Controller, cell: &ParamCell, batch_count: u32) -> TokenResult;
}

/// Controller binds a hotspot rule with its parameter statistics and checker.
#[derive(Debug)]
pub struct Controller {
    rule: Arc<Rule>,
    metric: Arc<ParamsMetric>,
    checker: Arc<dyn Checker>,
}

impl Controller {
    /// Please refer to the generators in the `rule_manager`
    pub fn new(rule: Arc<Rule>, metric: Arc<ParamsMetric>, checker: Arc<dyn Checker>) -> Self {
        Controller {
            rule,
            metric,
            checker,
        }
    }

    pub fn metric(&self) -> &Arc<ParamsMetric> {
        &self.metric
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn param_index(&self) -> isize {
        self.rule.param_index
    }

    /// checks the QPS of the value with the checker
    pub fn perform_checking(&self, arg: &ParamKey, batch_count: u32) -> TokenResult {
        let now = utils::curr_time_millis();
        let cell = self
            .metric
            .resolve_qps(arg, now, self.rule.duration_in_ms());
        self.checker.do_check(self, &cell, batch_count)
    }

    /// `acquire_concurrency` takes an in-flight slot of the value,
    /// the caller releases it by decrementing the returned cell.
    pub fn acquire_concurrency(&self, arg: &ParamKey) -> Result<Arc<AtomicU64>, TokenResult> {
        let cell = self.metric.resolve_concurrency(arg);
        let threshold = self.rule.threshold_of(&cell);
        let concurrency = self.metric.concurrency_of(&cell);
        let mut current = concurrency.load(Ordering::SeqCst);
        loop {
            if current + 1 > threshold {
                let msg = format!("hotspot specific concurrency check blocked, arg: {:?}", arg);
                return Err(self.blocked(msg, current + 1));
            }
            match concurrency.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(concurrency),
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn blocked(&self, msg: String, value: u64) -> TokenResult {
        TokenResult::new_blocked_with_cause(
            BlockType::ParamFlow,
            msg,
            self.rule.clone(),
            Arc::new(value) as Arc<Snapshot>,
        )
    }

    /// `extract_args` matches the arg from ctx, the attachment key takes precedence over the index
    pub fn extract_args(&self, ctx: &EntryContext) -> Option<ParamKey> {
        self.extract_kv_args(ctx)
            .or_else(|| self.extract_list_args(ctx))
    }

    fn extract_list_args(&self, ctx: &EntryContext) -> Option<ParamKey> {
        let args = match ctx.input().args() {
            Some(args) => args,
            None => {
                logging::debug!("[extract_args] The args of ctx is None");
                return None;
            }
        };
        let mut idx = self.rule.param_index;
        if idx < 0 {
            idx += args.len() as isize;
        }
        if idx < 0 || idx as usize >= args.len() {
            logging::debug!(
                "[extract_args] The argument in index doesn't exist, args: {:?}, param_index: {}",
                args,
                self.param_index()
            );
            return None;
        }
        Some(args[idx as usize].clone())
    }

    fn extract_kv_args(&self, ctx: &EntryContext) -> Option<ParamKey> {
        let attachments = ctx.input().attachments()?;
        let key = self.rule.param_key.trim();
        if key.is_empty() {
            return None;
        }
        match attachments.get(key) {
            Some(value) => Some(value.clone()),
            None => {
                logging::debug!(
                    "[extract_args] The extracted data does not exist, key: {:?}, attachments: {:?}",
                    self.rule.param_key,
                    attachments
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ParamsMap, SentinelInput};
    use crate::hotspot::rule_manager::{gen_reject, gen_throttling};

    fn ctx_with(args: Vec<&str>, attachments: Vec<(&str, &str)>) -> EntryContext {
        let mut ctx = EntryContext::new();
        let mut input = SentinelInput::new(1, 0);
        input.set_args(args.into_iter().map(String::from).collect());
        let mut map = ParamsMap::new();
        for (k, v) in attachments {
            map.insert(k.into(), v.into());
        }
        input.set_attachments(map);
        ctx.set_input(input);
        ctx
    }

    fn qps_rule(param_index: isize, param_key: &str) -> Arc<Rule> {
        Arc::new(Rule {
            resource: "abc".into(),
            metric_type: MetricType::QPS,
            duration_in_sec: 1,
            threshold: 10,
            param_index,
            param_key: param_key.into(),
            ..Default::default()
        })
    }

    #[test]
    fn extract_args() {
        let ctx = ctx_with(vec!["1", "2"], vec![("test1", "v1")]);
        let cases = vec![
            (0, "test1", Some("v1")),
            (1, "test2", Some("2")),
            (-1, "", Some("2")),
            (-2, "", Some("1")),
            (-3, "", None),
            (10, "test2", None),
        ];
        for (index, key, expected) in cases {
            let controller = gen_reject(qps_rule(index, key), None);
            assert_eq!(
                expected.map(String::from),
                controller.extract_args(&ctx),
                "index {}, key {}",
                index,
                key
            );
        }
        let controller = gen_reject(qps_rule(0, ""), None);
        assert!(controller.extract_args(&EntryContext::new()).is_none());
    }

    #[test]
    fn concurrency() {
        let mut specific_items = std::collections::HashMap::new();
        specific_items.insert("vip".to_string(), 2);
        let rule = Arc::new(Rule {
            resource: "abc".into(),
            metric_type: MetricType::Concurrency,
            threshold: 1,
            specific_items,
            ..Default::default()
        });
        let controller = gen_reject(rule, None);
        let a = controller.acquire_concurrency(&"a".into()).unwrap();
        assert_eq!(1, a.load(Ordering::SeqCst));
        let blocked = controller.acquire_concurrency(&"a".into()).unwrap_err();
        assert_eq!(BlockType::ParamFlow, blocked.block_err().unwrap().block_type());
        a.fetch_sub(1, Ordering::SeqCst);
        assert!(controller.acquire_concurrency(&"a".into()).is_ok());

        assert!(controller.acquire_concurrency(&"vip".into()).is_ok());
        assert!(controller.acquire_concurrency(&"vip".into()).is_ok());
        assert!(controller.acquire_concurrency(&"vip".into()).is_err());
    }

    #[test]
    fn others_bucket() {
        let rule = Arc::new(Rule {
            resource: "abc".into(),
            metric_type: MetricType::Concurrency,
            threshold: 5,
            params_max_capacity: 1,
            others_threshold: Some(1),
            ..Default::default()
        });
        let controller = gen_reject(rule, None);
        let _a = controller.acquire_concurrency(&"a".into()).unwrap();
        // "b" and "c" share the others entry, limited to 1
        let _b = controller.acquire_concurrency(&"b".into()).unwrap();
        assert!(controller.acquire_concurrency(&"c".into()).is_err());
        assert_eq!(1, controller.metric().concurrency_counter.len());
    }

    #[test]
    fn generators() {
        let rule = Arc::new(Rule {
            control_strategy: ControlStrategy::Throttling,
            ..(*qps_rule(0, "")).clone()
        });
        let controller = gen_throttling(rule, None);
        assert!(controller.perform_checking(&"a".into(), 1).is_pass());
    }
}
