use super::*;
use crate::logging;
use std::sync::Arc;

/// `AverageRtBreaker` opens when the average response time of the completed requests
/// exceeds the threshold (in ms).
#[derive(Debug)]
pub struct AverageRtBreaker {
    breaker: Arc<BreakerBase>,
    max_avg_rt: f64,
    min_request_amount: u64,
    stat: Arc<CounterLeapArray>,
}

impl AverageRtBreaker {
    pub fn new(rule: Arc<Rule>) -> Result<Self> {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = CounterLeapArray::new(bucket_count, interval)?;
        Ok(Self::new_with_stat(rule, Arc::new(stat)))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            max_avg_rt: rule.threshold,
            min_request_amount: rule.min_request_amount,
            breaker: Arc::new(BreakerBase::new(rule)),
            stat,
        }
    }
}

impl CircuitBreakerTrait for AverageRtBreaker {
    fn breaker(&self) -> &Arc<BreakerBase> {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, rt: u64, _err: &Option<Error>, trial: bool) {
        // the target of a bucket is the sum of the response time
        if let Err(err) = self.stat.add_request(rt) {
            logging::error!(
                "[AverageRtBreaker] Fail to get current counter, rule: {:?}, error: {:?}",
                self.bound_rule(),
                err
            );
            return;
        }
        let (total_rt, total_count) = self.stat.sum();
        let avg_rt = total_rt as f64 / total_count as f64;

        match self.current_state() {
            State::HalfOpen if trial => {
                self.breaker.on_probe_complete(
                    rt as f64 > self.max_avg_rt,
                    Arc::new(avg_rt),
                    &self.stat,
                );
            }
            State::Closed => {
                if total_count >= self.min_request_amount && avg_rt > self.max_avg_rt {
                    self.breaker.from_closed_to_open(Arc::new(avg_rt));
                }
            }
            _ => {}
        }
    }
}
