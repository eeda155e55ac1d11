use super::{ClusterNode, DefaultNode, StatParams, StatisticNode};
use crate::{
    base::{ResourceType, ResourceWrapper, TrafficType, DEFAULT_MAX_RESOURCE_AMOUNT},
    config, logging, Result,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ClusterNodeMap = HashMap<String, Arc<ClusterNode>>;
/// keyed by (context name, resource name)
type DefaultNodeMap = HashMap<(String, String), Arc<DefaultNode>>;
type EntranceNodeMap = HashMap<String, Arc<DefaultNode>>;

lazy_static! {
    static ref DEFAULT_NODE_STORAGE: Arc<NodeStorage> = Arc::new(NodeStorage::from_config());
}

/// the process wide storage used by the global slot chain
pub fn default_node_storage() -> Arc<NodeStorage> {
    DEFAULT_NODE_STORAGE.clone()
}

/// NodeStorage owns every statistic node of a slot chain.
/// Nodes are created on first use and live as long as the storage.
/// The amount of resources is bounded by `max_resource_amount`,
/// a resource beyond the bound is served without statistics.
#[derive(Debug)]
pub struct NodeStorage {
    params: StatParams,
    max_resource_amount: usize,
    inbound_node: Arc<StatisticNode>,
    cluster_nodes: RwLock<ClusterNodeMap>,
    default_nodes: RwLock<DefaultNodeMap>,
    entrance_nodes: RwLock<EntranceNodeMap>,
}

impl NodeStorage {
    pub fn new(params: StatParams, max_resource_amount: usize) -> Result<Self> {
        params.check()?;
        Ok(NodeStorage {
            params,
            max_resource_amount,
            inbound_node: Arc::new(StatisticNode::new(&params)?),
            cluster_nodes: RwLock::new(ClusterNodeMap::new()),
            default_nodes: RwLock::new(DefaultNodeMap::new()),
            entrance_nodes: RwLock::new(EntranceNodeMap::new()),
        })
    }

    /// build the storage from the global config,
    /// invalid statistic parameters fall back to the default ones
    pub fn from_config() -> Self {
        let params = StatParams {
            sample_count_total: config::global_stat_sample_count_total(),
            interval_ms_total: config::global_stat_interval_ms_total(),
            sample_count: config::metric_stat_sample_count(),
            interval_ms: config::metric_stat_interval_ms(),
        };
        let max_resource_amount = config::max_resource_amount();
        match Self::new(params, max_resource_amount) {
            Ok(storage) => storage,
            Err(err) => {
                logging::warn!(
                    "[NodeStorage] Invalid statistic parameters {:?}, use the default ones instead, error: {:?}",
                    params,
                    err
                );
                NodeStorage {
                    max_resource_amount,
                    ..Default::default()
                }
            }
        }
    }

    pub fn params(&self) -> &StatParams {
        &self.params
    }

    /// the statistics of all the inbound traffic, used by the system adaptive protection
    pub fn inbound_node(&self) -> Arc<StatisticNode> {
        self.inbound_node.clone()
    }

    pub fn get_cluster_node(&self, res_name: &str) -> Option<Arc<ClusterNode>> {
        self.cluster_nodes.read().unwrap().get(res_name).cloned()
    }

    pub fn cluster_node_list(&self) -> Vec<Arc<ClusterNode>> {
        self.cluster_nodes.read().unwrap().values().cloned().collect()
    }

    pub fn resource_count(&self) -> usize {
        self.cluster_nodes.read().unwrap().len()
    }

    fn exceeds_amount(&self, res_name: &str) -> bool {
        let cluster_nodes = self.cluster_nodes.read().unwrap();
        if !cluster_nodes.contains_key(res_name) && cluster_nodes.len() >= self.max_resource_amount
        {
            logging::warn!(
                "[NodeStorage] Resource amount exceeds the threshold {}, resource {} will not be counted",
                self.max_resource_amount,
                res_name
            );
            true
        } else {
            false
        }
    }

    /// Returns `None` if the resource is beyond the bound of resource amount.
    /// The first writer wins when several threads create the node of one resource.
    pub fn get_or_create_cluster_node(
        &self,
        resource: &ResourceWrapper,
    ) -> Option<Arc<ClusterNode>> {
        if let Some(node) = self.get_cluster_node(resource.name()) {
            return Some(node);
        }
        if self.exceeds_amount(resource.name()) {
            return None;
        }
        match ClusterNode::new(resource.clone(), &self.params) {
            Ok(node) => Some(
                self.cluster_nodes
                    .write()
                    .unwrap()
                    .entry(resource.name().clone())
                    .or_insert_with(|| Arc::new(node))
                    .clone(),
            ),
            Err(err) => {
                logging::error!(
                    "[NodeStorage] Fail to create the cluster node of {}, error: {:?}",
                    resource.name(),
                    err
                );
                None
            }
        }
    }

    pub fn get_default_node(&self, context_name: &str, res_name: &str) -> Option<Arc<DefaultNode>> {
        self.default_nodes
            .read()
            .unwrap()
            .get(&(context_name.to_string(), res_name.to_string()))
            .cloned()
    }

    /// Returns `None` if the resource is beyond the bound of resource amount.
    pub fn get_or_create_default_node(
        &self,
        context_name: &str,
        resource: &ResourceWrapper,
    ) -> Option<Arc<DefaultNode>> {
        if let Some(node) = self.get_default_node(context_name, resource.name()) {
            return Some(node);
        }
        if self.exceeds_amount(resource.name()) {
            return None;
        }
        match DefaultNode::new(resource.clone(), context_name.to_string(), &self.params) {
            Ok(node) => Some(
                self.default_nodes
                    .write()
                    .unwrap()
                    .entry((context_name.to_string(), resource.name().clone()))
                    .or_insert_with(|| Arc::new(node))
                    .clone(),
            ),
            Err(err) => {
                logging::error!(
                    "[NodeStorage] Fail to create the default node of {} in context {}, error: {:?}",
                    resource.name(),
                    context_name,
                    err
                );
                None
            }
        }
    }

    /// the root node of the call trees named `context_name`
    pub fn get_or_create_entrance_node(&self, context_name: &str) -> Result<Arc<DefaultNode>> {
        if let Some(node) = self.entrance_nodes.read().unwrap().get(context_name) {
            return Ok(node.clone());
        }
        let node = DefaultNode::new(
            ResourceWrapper::new(
                context_name.to_string(),
                ResourceType::Common,
                TrafficType::Inbound,
            ),
            context_name.to_string(),
            &self.params,
        )?;
        Ok(self
            .entrance_nodes
            .write()
            .unwrap()
            .entry(context_name.to_string())
            .or_insert_with(|| Arc::new(node))
            .clone())
    }

    pub fn entrance_node_list(&self) -> Vec<Arc<DefaultNode>> {
        self.entrance_nodes.read().unwrap().values().cloned().collect()
    }

    /// drop all the nodes except the inbound one
    pub fn reset(&self) {
        self.cluster_nodes.write().unwrap().clear();
        self.default_nodes.write().unwrap().clear();
        self.entrance_nodes.write().unwrap().clear();
    }
}

impl Default for NodeStorage {
    fn default() -> Self {
        Self::new(StatParams::default(), DEFAULT_MAX_RESOURCE_AMOUNT)
            .expect("the default statistic parameters are valid")
    }
}
