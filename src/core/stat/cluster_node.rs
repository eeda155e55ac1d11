use super::{StatParams, StatisticNode};
use crate::{base::ResourceWrapper, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// ClusterNode holds the statistics of a resource for all the callers and all the contexts,
/// together with the statistics of each caller (origin) of the resource.
#[derive(Debug)]
pub struct ClusterNode {
    resource: ResourceWrapper,
    params: StatParams,
    stat: Arc<StatisticNode>,
    origin_nodes: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl ClusterNode {
    pub fn new(resource: ResourceWrapper, params: &StatParams) -> Result<Self> {
        Ok(ClusterNode {
            resource,
            params: *params,
            stat: Arc::new(StatisticNode::new(params)?),
            origin_nodes: RwLock::new(HashMap::new()),
        })
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn name(&self) -> &String {
        self.resource.name()
    }

    pub fn stat(&self) -> Arc<StatisticNode> {
        self.stat.clone()
    }

    pub fn get_origin_node(&self, origin: &str) -> Option<Arc<StatisticNode>> {
        self.origin_nodes.read().unwrap().get(origin).cloned()
    }

    /// the first writer wins when several threads create the node of one origin
    pub fn get_or_create_origin_node(&self, origin: &str) -> Result<Arc<StatisticNode>> {
        if let Some(node) = self.get_origin_node(origin) {
            return Ok(node);
        }
        let node = Arc::new(StatisticNode::new(&self.params)?);
        let mut origin_nodes = self.origin_nodes.write().unwrap();
        Ok(origin_nodes
            .entry(origin.to_string())
            .or_insert(node)
            .clone())
    }

    pub fn origin_count(&self) -> usize {
        self.origin_nodes.read().unwrap().len()
    }
}
