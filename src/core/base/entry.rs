use super::{EntryContext, SlotChain, TokenResult};
use crate::utils::curr_time_millis;
use crate::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// the entry may be exited in another thread or from an async task,
/// therefore we need Arc (for Sync and Send) and RwLock (for inner mutability)
pub type EntryStrongPtr = Arc<SentinelEntry>;

pub struct SentinelEntry {
    ctx: RwLock<EntryContext>,
    /// each entry traverses a slot chain,
    /// global slot chain is wrapped by Arc, thus here we use Arc
    sc: Arc<SlotChain>,
    exited: AtomicBool,
}

impl SentinelEntry {
    pub fn new(ctx: EntryContext, sc: Arc<SlotChain>) -> Self {
        SentinelEntry {
            ctx: RwLock::new(ctx),
            sc,
            exited: AtomicBool::new(false),
        }
    }

    /// run the entry through its slot chain
    pub(crate) fn check(&self) -> TokenResult {
        let mut ctx = self.ctx.write().unwrap_or_else(|e| e.into_inner());
        self.sc.entry(&mut ctx)
    }

    pub fn context(&self) -> RwLockReadGuard<'_, EntryContext> {
        self.ctx.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn resource_name(&self) -> String {
        self.context().resource().name().clone()
    }

    /// record a business error, which is counted as `MetricEvent::Error` on exit
    pub fn set_err(&self, err: Error) {
        self.ctx
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_err(err);
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// exit releases the entry, only the first call takes effect
    pub fn exit(&self) {
        if self.exited.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut ctx = self.ctx.write().unwrap_or_else(|e| e.into_inner());
        let round_trip = curr_time_millis().saturating_sub(ctx.start_time());
        ctx.set_round_trip(round_trip);
        self.sc.exit(&mut ctx);
    }
}

impl fmt::Debug for SentinelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelEntry")
            .field("resource", &self.resource_name())
            .field("exited", &self.is_exited())
            .finish()
    }
}

impl Drop for SentinelEntry {
    fn drop(&mut self) {
        self.exit();
    }
}
