use super::{BlockError, EntryContext, TokenResult, SLOT_INIT};
use crate::logging;
use crate::utils::{self, AsAny};
use std::any::Any;
use std::cmp;
use std::sync::Arc;

/// trait `PartialOrd` is not object safe
/// SlotChain will sort all it's slots by ascending sort value
pub trait BaseSlot: Any + AsAny + Sync + Send {
    /// order returns the sort value of the slot.
    fn order(&self) -> u32 {
        0
    }
}

/// Slot is one stage of the slot chain.
/// A slot may prepare nodes, check rules or record statistics,
/// and it is notified of the final decision after all the later slots have decided.
pub trait Slot: BaseSlot {
    /// entry function do the preparation or the rule checking of this slot.
    /// A `Blocked` result breaks off the slot pipeline.
    fn entry(&self, _ctx: &mut EntryContext) -> TokenResult {
        TokenResult::new_pass()
    }
    /// on_entry_pass function will be invoked in reverse order
    /// when every slot in the chain has passed
    fn on_entry_pass(&self, _ctx: &EntryContext) {}
    /// on_entry_blocked function will be invoked in reverse order
    /// on the slots whose `entry` has run, when a slot blocked the entry
    fn on_entry_blocked(&self, _ctx: &EntryContext, _block_error: &BlockError) {}
    /// exit function will be invoked in reverse order on the slots whose `entry` has run,
    /// no matter whether the entry passed or not
    fn exit(&self, _ctx: &mut EntryContext) {}
}

/// SlotChain hold all system slots and customized slot.
/// SlotChain support plug-in slots developed by developer.
pub struct SlotChain {
    /// slots is in ascending order by Slot.order() value.
    pub(self) slots: Vec<Arc<dyn Slot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self {
            slots: Vec::with_capacity(SLOT_INIT),
        }
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Default::default()
    }

    /// add_slot adds the slot to the SlotChain.
    /// All slots in the list will be sorted according to Slot.order() in ascending order.
    /// add_slot is non-thread safe, the chain is expected to be built before being shared
    pub fn add_slot(&mut self, s: Arc<dyn Slot>) {
        self.slots.push(s);
        self.slots.sort_by_key(|a| a.order());
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The entrance of slot chain
    /// Return the TokenResult
    pub fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        ctx.reset_result_to_pass();
        let mut entered = 0;
        for s in &self.slots {
            entered += 1;
            match s.entry(ctx) {
                TokenResult::Pass => {}
                TokenResult::Wait(nanos) => utils::sleep_for_ns(nanos),
                blocked @ TokenResult::Blocked(_) => {
                    ctx.set_result(blocked);
                    break;
                }
            }
        }
        ctx.set_entered(entered);

        let entered_slots = self.slots[..entered].iter().rev();
        match ctx.result().block_err() {
            None => {
                for s in entered_slots {
                    s.on_entry_pass(ctx);
                }
            }
            Some(block_error) => {
                for s in entered_slots {
                    s.on_entry_blocked(ctx, &block_error);
                }
            }
        }
        ctx.result().clone()
    }

    pub fn exit(&self, ctx: &mut EntryContext) {
        for handler in ctx.take_exit_handlers() {
            if let Err(err) = handler(ctx) {
                logging::error!(
                    "[SlotChain::exit] Fail to execute exit handler, resource: {}, error: {:?}",
                    ctx.resource().name(),
                    err
                );
            }
        }
        let entered = cmp::min(ctx.entered(), self.slots.len());
        for s in self.slots[..entered].iter().rev() {
            s.exit(ctx);
        }
    }
}
