//! Throttling indicates that pending requests will be throttled,
//! wait in queue (until free capacity is available)

use super::*;
use crate::{base::TokenResult, utils};
use std::sync::atomic::Ordering;

#[derive(Debug, Default)]
pub struct ThrottlingChecker {}

impl ThrottlingChecker {
    pub fn new() -> Self {
        ThrottlingChecker {}
    }
}

impl Checker for ThrottlingChecker {
    fn do_check(&self, owner: &Controller, cell: &ParamCell, batch_count: u32) -> TokenResult {
        let rule = owner.rule();
        let key = cell.key();
        let time_counter = owner.metric().time_counter(cell);
        if time_counter.cap() == 0 {
            return TokenResult::new_pass();
        }
        let token_count = rule.threshold_of(cell);
        if token_count == 0 {
            let msg = format!("hotspot QPS check blocked, threshold is 0, arg: {:?}", key);
            return owner.blocked(msg, token_count);
        }

        let interval_cost_time =
            ((batch_count as u64 * rule.duration_in_ms()) as f64 / token_count as f64).round() as u64;
        loop {
            let current_time_in_ms = utils::curr_time_millis();
            let last_pass_time_cell = match time_counter.add_if_absent(key.clone(), current_time_in_ms)
            {
                Some(cell) => cell,
                None => return TokenResult::new_pass(),
            };
            let last_pass_time = last_pass_time_cell.load(Ordering::SeqCst);
            let expected_time = last_pass_time + interval_cost_time;

            if expected_time <= current_time_in_ms
                || expected_time - current_time_in_ms < rule.max_queueing_time_ms
            {
                if last_pass_time_cell
                    .compare_exchange(
                        last_pass_time,
                        expected_time.max(current_time_in_ms),
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    if expected_time > current_time_in_ms {
                        let await_ms = expected_time - current_time_in_ms;
                        return TokenResult::new_should_wait(utils::milli2nano(await_ms) as u64);
                    }
                    return TokenResult::new_pass();
                }
                std::thread::yield_now();
            } else {
                let msg = format!("hotspot throttling check blocked, wait time exceedes max queueing time, arg: {:?}", key);
                return owner.blocked(msg, token_count);
            }
        }
    }
}
