//! Throttling indicates that pending requests will be throttled,
//! wait in queue (until free capacity is available)

use super::Checker;
use crate::base::{BlockType, StatNode, TokenResult};
use crate::flow::Rule;
use crate::utils;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

const BLOCK_MSG_QUEUEING: &str = "flow throttling check blocked, estimated queueing time exceeds max queueing time";
const BLOCK_MSG_NO_CAPACITY: &str = "flow throttling check blocked, the batch exceeds the threshold";
/// the threshold is a per second rate
const STAT_INTERVAL_MS: u32 = 1000;

/// ThrottlingChecker paces the admissions of a resource `1/threshold` seconds apart.
/// A request arriving early waits its turn, unless the wait exceeds `max_queueing_time_ms`.
#[derive(Debug)]
pub struct ThrottlingChecker {
    rule: Arc<Rule>,
    max_queueing_time_ns: i64,
    stat_interval_ns: i64,
    last_passed_time: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        ThrottlingChecker {
            max_queueing_time_ns: utils::milli2nano(rule.max_queueing_time_ms) as i64,
            stat_interval_ns: utils::milli2nano(STAT_INTERVAL_MS) as i64,
            last_passed_time: AtomicI64::new(0),
            rule,
        }
    }

    fn blocked(&self, msg: &str, snapshot: f64) -> TokenResult {
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            msg.into(),
            self.rule.clone(),
            Arc::new(snapshot),
        )
    }
}

impl ThrottlingChecker {
    /// claims the current instant when the previous admission is at least `interval_ns` old
    fn try_pass_now(&self, now: i64, interval_ns: i64) -> bool {
        let last = self.last_passed_time.load(Ordering::SeqCst);
        last + interval_ns <= now
            && self
                .last_passed_time
                .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
    }

    /// books the slot `interval_ns` after the latest admission and returns the time to wait for it
    fn reserve(&self, now: i64, interval_ns: i64) -> std::result::Result<i64, i64> {
        // cheap rejection before touching the shared slot
        let queueing = self.last_passed_time.load(Ordering::SeqCst) + interval_ns - now;
        if queueing > self.max_queueing_time_ns {
            return Err(queueing);
        }
        let slot = self
            .last_passed_time
            .fetch_add(interval_ns, Ordering::SeqCst)
            + interval_ns;
        let queueing = slot - now;
        if queueing > self.max_queueing_time_ns {
            self.last_passed_time
                .fetch_sub(interval_ns, Ordering::SeqCst);
            return Err(queueing);
        }
        Ok(queueing.max(0))
    }
}

impl Checker for ThrottlingChecker {
    fn do_check(
        &self,
        _stat_node: Option<&Arc<dyn StatNode>>,
        batch_count: u32,
        threshold: f64,
    ) -> TokenResult {
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        if threshold <= 0.0 || batch_count as f64 > threshold {
            return self.blocked(BLOCK_MSG_NO_CAPACITY, threshold);
        }
        // nanoseconds for an accurate queueing time
        let interval_ns = (batch_count as f64 / threshold * self.stat_interval_ns as f64) as i64;
        let now = utils::curr_time_nanos() as i64;
        if self.try_pass_now(now, interval_ns) {
            return TokenResult::new_pass();
        }
        match self.reserve(now, interval_ns) {
            Ok(wait_ns) => TokenResult::new_should_wait(wait_ns as u64),
            Err(queueing) => self.blocked(BLOCK_MSG_QUEUEING, queueing as f64),
        }
    }
}
