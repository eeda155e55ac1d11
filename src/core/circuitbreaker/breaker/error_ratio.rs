use super::*;
use crate::logging;
use std::sync::Arc;

/// `ErrorRatioBreaker` opens when the ratio of the requests completed with an error
/// exceeds the threshold.
#[derive(Debug)]
pub struct ErrorRatioBreaker {
    breaker: Arc<BreakerBase>,
    min_request_amount: u64,
    error_ratio_threshold: f64,
    stat: Arc<CounterLeapArray>,
}

impl ErrorRatioBreaker {
    pub fn new(rule: Arc<Rule>) -> Result<Self> {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = CounterLeapArray::new(bucket_count, interval)?;
        Ok(Self::new_with_stat(rule, Arc::new(stat)))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            min_request_amount: rule.min_request_amount,
            error_ratio_threshold: rule.threshold,
            breaker: Arc::new(BreakerBase::new(rule)),
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorRatioBreaker {
    fn breaker(&self) -> &Arc<BreakerBase> {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, _rt: u64, err: &Option<Error>, trial: bool) {
        if let Err(e) = self.stat.add_request(err.is_some() as u64) {
            logging::error!(
                "[ErrorRatioBreaker] Fail to get current counter, rule: {:?}, error: {:?}",
                self.bound_rule(),
                e
            );
            return;
        }
        let (error_count, total_count) = self.stat.sum();
        let error_ratio = error_count as f64 / total_count as f64;

        match self.current_state() {
            State::HalfOpen if trial => {
                self.breaker
                    .on_probe_complete(err.is_some(), Arc::new(error_ratio), &self.stat);
            }
            State::Closed => {
                if total_count >= self.min_request_amount
                    && ratio_exceeded(error_ratio, self.error_ratio_threshold)
                {
                    self.breaker.from_closed_to_open(Arc::new(error_ratio));
                }
            }
            _ => {}
        }
    }
}
