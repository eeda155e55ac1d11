use super::{ClusterNode, StatParams, StatisticNode};
use crate::{base::ResourceWrapper, Result};
use std::sync::{Arc, RwLock};

/// DefaultNode holds the statistics of a resource reached through one context (call path).
/// It is linked to the `ClusterNode` of the resource
/// and to the nodes of the resources invoked inside it.
#[derive(Debug)]
pub struct DefaultNode {
    resource: ResourceWrapper,
    context_name: String,
    stat: Arc<StatisticNode>,
    cluster_node: RwLock<Option<Arc<ClusterNode>>>,
    children: RwLock<Vec<Arc<DefaultNode>>>,
}

impl DefaultNode {
    pub fn new(resource: ResourceWrapper, context_name: String, params: &StatParams) -> Result<Self> {
        Ok(DefaultNode {
            resource,
            context_name,
            stat: Arc::new(StatisticNode::new(params)?),
            cluster_node: RwLock::new(None),
            children: RwLock::new(Vec::new()),
        })
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn context_name(&self) -> &String {
        &self.context_name
    }

    pub fn stat(&self) -> Arc<StatisticNode> {
        self.stat.clone()
    }

    pub fn cluster_node(&self) -> Option<Arc<ClusterNode>> {
        self.cluster_node.read().unwrap().clone()
    }

    /// link the node to its cluster node, an existing link is kept
    pub fn set_cluster_node(&self, cluster_node: Arc<ClusterNode>) {
        let mut current = self.cluster_node.write().unwrap();
        if current.is_none() {
            *current = Some(cluster_node);
        }
    }

    pub fn add_child(&self, child: Arc<DefaultNode>) {
        let mut children = self.children.write().unwrap();
        if !children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            children.push(child);
        }
    }

    pub fn children(&self) -> Vec<Arc<DefaultNode>> {
        self.children.read().unwrap().clone()
    }
}
