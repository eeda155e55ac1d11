use super::*;
use crate::logging;
use std::sync::Arc;

/// `ErrorCountBreaker` opens when the number of the requests completed with an error
/// reaches the threshold.
#[derive(Debug)]
pub struct ErrorCountBreaker {
    breaker: Arc<BreakerBase>,
    min_request_amount: u64,
    error_count_threshold: u64,
    stat: Arc<CounterLeapArray>,
}

impl ErrorCountBreaker {
    pub fn new(rule: Arc<Rule>) -> Result<Self> {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = CounterLeapArray::new(bucket_count, interval)?;
        Ok(Self::new_with_stat(rule, Arc::new(stat)))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            min_request_amount: rule.min_request_amount,
            error_count_threshold: rule.threshold as u64,
            breaker: Arc::new(BreakerBase::new(rule)),
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorCountBreaker {
    fn breaker(&self) -> &Arc<BreakerBase> {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, _rt: u64, err: &Option<Error>, trial: bool) {
        if let Err(e) = self.stat.add_request(err.is_some() as u64) {
            logging::error!(
                "[ErrorCountBreaker] Fail to get current counter, rule: {:?}, error: {:?}",
                self.bound_rule(),
                e
            );
            return;
        }
        let (error_count, total_count) = self.stat.sum();

        match self.current_state() {
            State::HalfOpen if trial => {
                self.breaker
                    .on_probe_complete(err.is_some(), Arc::new(error_count), &self.stat);
            }
            State::Closed => {
                if total_count >= self.min_request_amount
                    && error_count >= self.error_count_threshold
                {
                    self.breaker.from_closed_to_open(Arc::new(error_count));
                }
            }
            _ => {}
        }
    }
}
