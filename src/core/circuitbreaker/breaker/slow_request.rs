use super::*;
use crate::logging;
use std::sync::Arc;

/// `SlowRtBreaker` opens when the ratio of requests slower than `max_allowed_rt_ms`
/// exceeds the threshold.
#[derive(Debug)]
pub struct SlowRtBreaker {
    breaker: Arc<BreakerBase>,
    max_allowed_rt: u64,
    max_slow_request_ratio: f64,
    min_request_amount: u64,
    // stat needs to be shared, so we take Arc
    stat: Arc<CounterLeapArray>,
}

impl SlowRtBreaker {
    pub fn new(rule: Arc<Rule>) -> Result<Self> {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = CounterLeapArray::new(bucket_count, interval)?;
        Ok(Self::new_with_stat(rule, Arc::new(stat)))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            max_allowed_rt: rule.max_allowed_rt_ms,
            max_slow_request_ratio: rule.threshold,
            min_request_amount: rule.min_request_amount,
            breaker: Arc::new(BreakerBase::new(rule)),
            stat,
        }
    }
}

impl CircuitBreakerTrait for SlowRtBreaker {
    fn breaker(&self) -> &Arc<BreakerBase> {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, rt: u64, _err: &Option<Error>, trial: bool) {
        let is_slow = rt > self.max_allowed_rt;
        if let Err(err) = self.stat.add_request(is_slow as u64) {
            logging::error!(
                "[SlowRtBreaker] Fail to get current counter, rule: {:?}, error: {:?}",
                self.bound_rule(),
                err
            );
            return;
        }
        let (slow_count, total_count) = self.stat.sum();
        let slow_ratio = slow_count as f64 / total_count as f64;

        match self.current_state() {
            State::HalfOpen if trial => {
                self.breaker
                    .on_probe_complete(is_slow, Arc::new(slow_ratio), &self.stat);
            }
            State::Closed => {
                if total_count >= self.min_request_amount
                    && ratio_exceeded(slow_ratio, self.max_slow_request_ratio)
                {
                    self.breaker.from_closed_to_open(Arc::new(slow_ratio));
                }
            }
            _ => {}
        }
    }
}
