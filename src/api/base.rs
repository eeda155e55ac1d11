use super::global_slot_chain;
use crate::base::{
    BlockError, Context, ContextPtr, EntryContext, EntryStrongPtr, ParamsList, ParamsMap,
    ResourceType, ResourceWrapper, SentinelEntry, SentinelInput, SlotChain, TokenResult,
    TrafficType,
};
use crate::stat::{default_node_storage, NodeStorage};
use crate::{utils, Error, Result};
use std::fmt;
use std::sync::Arc;

// EntryBuilder is the basic API of Sentinel.
pub struct EntryBuilder {
    resource_name: String,
    resource_type: ResourceType,
    traffic_type: TrafficType,
    batch_count: u32,
    flag: i32,
    /// `None` means the global slot chain
    slot_chain: Option<Arc<SlotChain>>,
    /// `None` means a fresh default context
    context: Option<ContextPtr>,
    args: Option<ParamsList>,
    attachments: Option<ParamsMap>,
}

impl EntryBuilder {
    pub fn new(resource_name: String) -> Self {
        EntryBuilder {
            resource_name,
            resource_type: ResourceType::default(),
            traffic_type: TrafficType::default(),
            batch_count: 1,
            flag: 0,
            slot_chain: None,
            context: None,
            args: None,
            attachments: None,
        }
    }

    /// `build()` would consume EntryBuilder.
    /// A blocked entry has been exited already when the `BlockError` is returned.
    pub fn build(self) -> std::result::Result<EntryStrongPtr, BlockError> {
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            self.resource_name,
            self.resource_type,
            self.traffic_type,
        ));

        let mut input = SentinelInput::new(self.batch_count, self.flag);
        if let Some(args) = self.args {
            input.set_args(args);
        }
        if let Some(attachments) = self.attachments {
            input.set_attachments(attachments);
        }
        ctx.set_input(input);
        if let Some(context) = self.context {
            ctx.set_context(context);
        }

        let sc = self.slot_chain.unwrap_or_else(global_slot_chain);
        let entry = Arc::new(SentinelEntry::new(ctx, sc));
        match entry.check() {
            TokenResult::Blocked(block_error) => {
                entry.exit();
                Err(block_error)
            }
            _ => Ok(entry),
        }
    }

    /// `call()` guards `f` with the entry: `f` only runs when the entry passes,
    /// its error is recorded on the entry, and its result is handed back unchanged.
    pub fn call<T, E, F>(self, f: F) -> std::result::Result<std::result::Result<T, E>, BlockError>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        let entry = self.build()?;
        let result = f();
        if let Err(err) = &result {
            entry.set_err(Error::msg(err.to_string()));
        }
        entry.exit();
        Ok(result)
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_flag(mut self, flag: i32) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_slot_chain(mut self, slot_chain: Arc<SlotChain>) -> Self {
        self.slot_chain = Some(slot_chain);
        self
    }

    pub fn with_context(mut self, context: ContextPtr) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_args(mut self, args: Option<ParamsList>) -> Self {
        self.args = args;
        self
    }

    pub fn with_attachments(mut self, attachments: Option<ParamsMap>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// entry is the shortcut of `EntryBuilder` on the global slot chain
pub fn entry(
    resource_name: String,
    traffic_type: TrafficType,
) -> std::result::Result<EntryStrongPtr, BlockError> {
    EntryBuilder::new(resource_name)
        .with_traffic_type(traffic_type)
        .build()
}

/// enter_context starts a call tree named `name` on behalf of the caller `origin`,
/// the entries built with it form the nested invocations of the tree
pub fn enter_context(name: &str, origin: &str) -> Result<ContextPtr> {
    enter_context_of(&default_node_storage(), name, origin)
}

/// enter_context_of starts a call tree whose entrance node lives in `storage`,
/// to be used with a slot chain built on the same storage
pub fn enter_context_of(storage: &NodeStorage, name: &str, origin: &str) -> Result<ContextPtr> {
    if utils::is_blank(name) {
        return Err(Error::msg("empty context name"));
    }
    let entrance = storage.get_or_create_entrance_node(name)?;
    Ok(Arc::new(Context::new(name.into(), origin.into(), entrance)))
}

pub fn trace_error(entry: &EntryStrongPtr, err: Error) {
    entry.set_err(err);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{BaseSlot, BlockType, Slot};
    use mockall::*;

    mock! {
        pub(crate) Slot {}
        impl BaseSlot for Slot {}
        impl Slot for Slot {
            fn entry(&self, ctx: &mut EntryContext) -> TokenResult;
            fn on_entry_pass(&self, ctx: &EntryContext);
            fn on_entry_blocked(&self, ctx: &EntryContext, block_error: &BlockError);
            fn exit(&self, ctx: &mut EntryContext);
        }
    }

    fn chain_of(slots: Vec<MockSlot>) -> Arc<SlotChain> {
        let mut sc = SlotChain::new();
        for s in slots {
            sc.add_slot(Arc::new(s));
        }
        Arc::new(sc)
    }

    #[test]
    fn pass() {
        let mut s1 = MockSlot::new();
        let mut s2 = MockSlot::new();
        let mut seq = Sequence::new();
        s1.expect_entry()
            .once()
            .in_sequence(&mut seq)
            .withf(|ctx| {
                ctx.resource().name() == "abc"
                    && ctx.input().batch_count() == 2
                    && ctx.input().args() == Some(&vec!["a".to_string()])
            })
            .returning(|_ctx| TokenResult::new_pass());
        s2.expect_entry()
            .once()
            .in_sequence(&mut seq)
            .returning(|_ctx| TokenResult::new_pass());
        s2.expect_on_entry_pass()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        s1.expect_on_entry_pass()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        s2.expect_exit().once().in_sequence(&mut seq).return_const(());
        s1.expect_exit().once().in_sequence(&mut seq).return_const(());
        s1.expect_on_entry_blocked().never().return_const(());
        s2.expect_on_entry_blocked().never().return_const(());

        let entry = EntryBuilder::new("abc".into())
            .with_batch_count(2)
            .with_args(Some(vec!["a".into()]))
            .with_slot_chain(chain_of(vec![s1, s2]))
            .build()
            .unwrap();
        assert_eq!("abc", entry.resource_name());
        entry.exit();
    }

    #[test]
    fn block() {
        let mut s1 = MockSlot::new();
        let mut s2 = MockSlot::new();
        s1.expect_entry()
            .once()
            .returning(|_ctx| TokenResult::new_pass());
        s2.expect_entry()
            .once()
            .returning(|_ctx| TokenResult::new_blocked(BlockType::Flow));
        s1.expect_on_entry_pass().never().return_const(());
        s2.expect_on_entry_pass().never().return_const(());
        s1.expect_on_entry_blocked().once().return_const(());
        s2.expect_on_entry_blocked().once().return_const(());
        // the blocked entry is exited before build returns
        s1.expect_exit().once().return_const(());
        s2.expect_exit().once().return_const(());

        let err = EntryBuilder::new("abc".into())
            .with_slot_chain(chain_of(vec![s1, s2]))
            .build()
            .unwrap_err();
        assert_eq!(BlockType::Flow, err.block_type());
    }

    #[test]
    fn call_records_error() {
        let mut s = MockSlot::new();
        s.expect_entry().returning(|_ctx| TokenResult::new_pass());
        s.expect_on_entry_pass().return_const(());
        s.expect_exit()
            .once()
            .withf(|ctx| ctx.get_err().is_some())
            .return_const(());
        let result = EntryBuilder::new("abc".into())
            .with_slot_chain(chain_of(vec![s]))
            .call(|| -> std::result::Result<u32, String> { Err("biz error".into()) })
            .unwrap();
        assert_eq!(Err("biz error".to_string()), result);
    }

    #[test]
    fn call_blocked() {
        let mut s = MockSlot::new();
        s.expect_entry()
            .returning(|_ctx| TokenResult::new_blocked(BlockType::Degrade));
        s.expect_on_entry_blocked().return_const(());
        s.expect_exit().once().return_const(());
        let mut called = false;
        let result = EntryBuilder::new("abc".into())
            .with_slot_chain(chain_of(vec![s]))
            .call(|| -> std::result::Result<(), String> {
                called = true;
                Ok(())
            });
        assert!(!called);
        assert_eq!(BlockType::Degrade, result.unwrap_err().block_type());
    }

    #[test]
    fn context() {
        let storage = NodeStorage::default();
        assert!(enter_context_of(&storage, " ", "").is_err());
        let context = enter_context_of(&storage, "web", "app-a").unwrap();
        assert_eq!("web", context.name());
        assert_eq!("app-a", context.origin());
        assert_eq!(1, storage.entrance_node_list().len());
    }
}
