use super::{default_node_storage, NodeStorage};
use crate::base::{BaseSlot, EntryContext, Slot, TokenResult};
use crate::logging;
use crate::utils::is_blank;
use lazy_static::lazy_static;
use std::sync::Arc;

const CLUSTER_BUILDER_SLOT_ORDER: u32 = 2000;

lazy_static! {
    pub static ref DEFAULT_CLUSTER_BUILDER_SLOT: Arc<ClusterBuilderSlot> =
        Arc::new(ClusterBuilderSlot::new(default_node_storage()));
}

pub fn default_cluster_builder_slot() -> Arc<ClusterBuilderSlot> {
    DEFAULT_CLUSTER_BUILDER_SLOT.clone()
}

/// ClusterBuilderSlot resolves the `ClusterNode` of the resource
/// and the statistic node of the caller when the context carries an origin.
pub struct ClusterBuilderSlot {
    storage: Arc<NodeStorage>,
}

impl ClusterBuilderSlot {
    pub fn new(storage: Arc<NodeStorage>) -> Self {
        ClusterBuilderSlot { storage }
    }
}

impl BaseSlot for ClusterBuilderSlot {
    fn order(&self) -> u32 {
        CLUSTER_BUILDER_SLOT_ORDER
    }
}

impl Slot for ClusterBuilderSlot {
    fn entry(&self, ctx: &mut EntryContext) -> TokenResult {
        let cluster_node = match self.storage.get_or_create_cluster_node(ctx.resource()) {
            Some(node) => node,
            None => return TokenResult::new_pass(),
        };
        if let Some(default_node) = ctx.default_node() {
            default_node.set_cluster_node(cluster_node.clone());
        }
        let origin = ctx.origin().to_string();
        if !is_blank(&origin) {
            match cluster_node.get_or_create_origin_node(&origin) {
                Ok(origin_node) => ctx.set_origin_node(origin_node),
                Err(err) => logging::error!(
                    "[ClusterBuilderSlot] Fail to create the origin node of {}, error: {:?}",
                    origin,
                    err
                ),
            }
        }
        ctx.set_cluster_node(cluster_node);
        TokenResult::new_pass()
    }
}
