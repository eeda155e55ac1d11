use super::{default_node_storage, NodeStorage};
use crate::base::{
    BaseSlot, Context, EntryContext, Slot, TokenResult, DEFAULT_CONTEXT_NAME,
};
use crate::logging;
use lazy_static::lazy_static;
use std::sync::Arc;

const NODE_SELECTOR_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_NODE_SELECTOR_SLOT: Arc<NodeSelectorSlot> =
        Arc::new(NodeSelectorSlot::new(default_node_storage()));
}

pub fn default_node_selector_slot() -> Arc<NodeSelectorSlot> {
    DEFAULT_NODE_SELECTOR_SLOT.clone()
}

/// NodeSelectorSlot resolves the `DefaultNode` of the resource in the current context
/// and hangs it in the call tree.
/// An entry without context gets a fresh one named `DEFAULT_CONTEXT_NAME` with no origin.
pub struct NodeSelectorSlot {
    storage: Arc<NodeStorage>,
}

impl NodeSelectorSlot {
    pub fn new(storage: Arc<NodeStorage>) -> Self {
        NodeSelectorSlot { storage }
    }
}

impl BaseSlot for NodeSelectorSlot {
    fn order(&self) -> u32 {
        NODE_SELECTOR_SLOT_ORDER
    }
}

impl Slot for NodeSelectorSlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        let context = match ctx.context() {
            Some(context) => context.clone(),
            None => match self.storage.get_or_create_entrance_node(DEFAULT_CONTEXT_NAME) {
                Ok(entrance) => {
                    let context = Arc::new(Context::new(
                        DEFAULT_CONTEXT_NAME.into(),
                        String::new(),
                        entrance,
                    ));
                    ctx.set_context(context.clone());
                    context
                }
                Err(err) => {
                    logging::error!(
                        "[NodeSelectorSlot] Fail to create the default context, error: {:?}",
                        err
                    );
                    return TokenResult::new_pass();
                }
            },
        };
        if let Some(node) = self
            .storage
            .get_or_create_default_node(context.name(), ctx.resource())
        {
            let parent = context.last_node();
            // a resource invoking itself does not become its own child
            if !Arc::ptr_eq(&parent, &node) {
                parent.add_child(node.clone());
            }
            context.push_node(node.clone());
            ctx.set_default_node(node);
        }
        TokenResult::new_pass()
    }

    fn exit(&self, ctx: &mut EntryContext) {
        if let (Some(context), Some(node)) = (ctx.context(), ctx.default_node()) {
            context.pop_node(node);
        }
    }
}
