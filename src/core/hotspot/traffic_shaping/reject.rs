//! Token bucket per parameter value, refilled every statistic duration

use super::*;
use crate::{base::TokenResult, utils};
use std::sync::atomic::Ordering;

#[derive(Debug, Default)]
pub struct RejectChecker {}

impl RejectChecker {
    pub fn new() -> Self {
        RejectChecker {}
    }
}

impl Checker for RejectChecker {
    fn do_check(&self, owner: &Controller, cell: &ParamCell, batch_count: u32) -> TokenResult {
        let rule = owner.rule();
        let key = cell.key();
        let time_counter = owner.metric().time_counter(cell);
        let token_counter = owner.metric().token_counter(cell);
        if time_counter.cap() == 0 || token_counter.cap() == 0 {
            return TokenResult::new_pass();
        }
        let token_count = rule.threshold_of(cell);
        if token_count == 0 {
            let msg = format!("hotspot QPS check blocked, threshold is 0, arg: {:?}", key);
            return owner.blocked(msg, token_count);
        }
        let batch_count = batch_count as u64;
        let max_count = token_count + rule.burst_count;
        if batch_count > max_count {
            let msg = format!("hotspot reject check blocked, request batch count is more than max token count, arg: {:?}", key);
            return owner.blocked(msg, batch_count);
        }
        let duration_ms = rule.duration_in_ms();

        loop {
            let current_time_in_ms = utils::curr_time_millis();
            let last_add_token_time = match time_counter.add_if_absent(key.clone(), current_time_in_ms)
            {
                Some(cell) => cell,
                None => {
                    // first fill, the tokens are consumed immediately
                    token_counter.add(key, max_count - batch_count);
                    return TokenResult::new_pass();
                }
            };

            let pass_time = current_time_in_ms.saturating_sub(last_add_token_time.load(Ordering::SeqCst));
            if pass_time > duration_ms {
                // the statistic duration has passed, refill the tokens
                let left_count = max_count - batch_count;
                let old_qps = match token_counter.add_if_absent(key.clone(), left_count) {
                    Some(cell) => cell,
                    None => {
                        last_add_token_time.store(current_time_in_ms, Ordering::SeqCst);
                        return TokenResult::new_pass();
                    }
                };
                let rest_qps = old_qps.load(Ordering::SeqCst);
                let to_add_token_num = pass_time * token_count / duration_ms;
                let new_qps = if to_add_token_num + rest_qps > max_count {
                    max_count as i64 - batch_count as i64
                } else {
                    (to_add_token_num + rest_qps) as i64 - batch_count as i64
                };
                if new_qps < 0 {
                    let msg = format!("hotspot reject check blocked, request batch count is more than available token count, arg: {:?}", key);
                    return owner.blocked(msg, rest_qps);
                }
                if old_qps
                    .compare_exchange(rest_qps, new_qps as u64, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    last_add_token_time.store(current_time_in_ms, Ordering::SeqCst);
                    return TokenResult::new_pass();
                }
            } else {
                let old_qps = match token_counter.get(&key) {
                    Some(cell) => cell,
                    None => {
                        // the tokens were evicted apart from the time, start over
                        if token_counter
                            .add_if_absent(key.clone(), max_count - batch_count)
                            .is_none()
                        {
                            return TokenResult::new_pass();
                        }
                        continue;
                    }
                };
                let old_rest_token = old_qps.load(Ordering::SeqCst);
                if old_rest_token < batch_count {
                    let msg = format!("hotspot reject check blocked, request batch count is more than available token count, arg: {:?}", key);
                    return owner.blocked(msg, old_rest_token);
                }
                if old_qps
                    .compare_exchange(
                        old_rest_token,
                        old_rest_token - batch_count,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return TokenResult::new_pass();
                }
            }
            std::thread::yield_now();
        }
    }
}
