use crate::base::{BaseSlot, BlockError, EntryContext, Slot};
use crate::utils::{curr_time_millis, format_time_millis};
use crate::{config, logging};
use lazy_static::lazy_static;
use lru::LruCache;
use std::sync::{Arc, Mutex};

const LOG_SLOT_ORDER: u32 = 3000;
/// at most one block log per resource in this period
const LOG_INTERVAL_MS: u64 = 1000;

lazy_static! {
    pub static ref DEFAULT_LOG_SLOT: Arc<LogSlot> = Arc::new(LogSlot::new());
}

pub fn default_log_slot() -> Arc<LogSlot> {
    DEFAULT_LOG_SLOT.clone()
}

/// LogSlot logs the blocked entries.
/// The last log time is kept for the most recently blocked resources only, up to the
/// configured `max_resource_amount` of them.
pub struct LogSlot {
    last_logged: Mutex<LruCache<String, u64>>,
}

impl Default for LogSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSlot {
    pub fn new() -> Self {
        Self::with_capacity(config::max_resource_amount())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LogSlot {
            last_logged: Mutex::new(LruCache::new(capacity.max(1))),
        }
    }

    /// whether the block of `res_name` at `now` should be logged
    fn try_acquire(&self, res_name: &str, now: u64) -> bool {
        let mut last_logged = self.last_logged.lock().unwrap();
        match last_logged.get_mut(res_name) {
            Some(last) if now < *last + LOG_INTERVAL_MS => false,
            Some(last) => {
                *last = now;
                true
            }
            None => {
                last_logged.put(res_name.to_string(), now);
                true
            }
        }
    }
}

impl BaseSlot for LogSlot {
    fn order(&self) -> u32 {
        LOG_SLOT_ORDER
    }
}

impl Slot for LogSlot {
    fn on_entry_blocked(&self, ctx: &EntryContext, block_error: &BlockError) {
        let res_name = ctx.resource().name();
        let now = curr_time_millis();
        if !self.try_acquire(res_name, now) {
            return;
        }
        logging::info!(
            "[LogSlot] Entry blocked at {}, resource: {}, type: {}, origin: {}, rule: {:?}, message: {}",
            format_time_millis(now),
            res_name,
            block_error.block_type(),
            ctx.origin(),
            block_error.triggered_rule(),
            block_error.block_msg()
        );
    }
}
