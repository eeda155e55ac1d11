//! Context
//!
use super::{ResourceWrapper, StatNode, TokenResult};
use crate::stat::{ClusterNode, DefaultNode, StatisticNode};
use crate::utils::time::curr_time_millis;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Context is the call tree that entries of one logical invocation share.
/// Each nested entry pushes its `DefaultNode` onto the node path, so that the
/// last node on the path is the parent of the next nested entry.
pub struct Context {
    name: String,
    /// the caller identity, empty if unknown
    origin: String,
    entrance_node: Arc<DefaultNode>,
    node_path: Mutex<Vec<Arc<DefaultNode>>>,
}

pub type ContextPtr = Arc<Context>;

impl Context {
    pub fn new(name: String, origin: String, entrance_node: Arc<DefaultNode>) -> Self {
        Context {
            name,
            origin,
            entrance_node,
            node_path: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn entrance_node(&self) -> Arc<DefaultNode> {
        self.entrance_node.clone()
    }

    /// the node of the innermost active entry, or the entrance node if there is none
    pub fn last_node(&self) -> Arc<DefaultNode> {
        self.node_path
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(|| self.entrance_node.clone())
    }

    pub fn push_node(&self, node: Arc<DefaultNode>) {
        self.node_path.lock().unwrap().push(node);
    }

    /// remove the innermost occurrence of `node`,
    /// entries of one context may exit out of order
    pub fn pop_node(&self, node: &Arc<DefaultNode>) {
        let mut path = self.node_path.lock().unwrap();
        if let Some(pos) = path.iter().rposition(|n| Arc::ptr_eq(n, node)) {
            path.remove(pos);
        }
    }

    pub fn depth(&self) -> usize {
        self.node_path.lock().unwrap().len()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("depth", &self.depth())
            .finish()
    }
}

pub type ExitHandler = Box<dyn Send + Sync + Fn(&EntryContext) -> Result<()>>;

/// EntryContext holds the per-invocation state threaded through the slot chain.
#[derive(Default)]
pub struct EntryContext {
    /// unique per `EntryContext::new`, 0 for a default built context
    id: u64,
    /// Use to calculate RT
    start_time: u64,
    /// The round trip time of this transaction
    round_trip: u64,
    resource: ResourceWrapper,
    context: Option<ContextPtr>,
    default_node: Option<Arc<DefaultNode>>,
    cluster_node: Option<Arc<ClusterNode>>,
    origin_node: Option<Arc<StatisticNode>>,
    input: SentinelInput,
    /// the result of rule slots check
    rule_check_result: TokenResult,
    err: Option<Error>,
    /// the number of slots whose `entry` has run, they are the only ones to be exited
    entered: usize,
    exit_handlers: Vec<ExitHandler>,
}

impl EntryContext {
    pub fn new() -> Self {
        EntryContext {
            id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
            start_time: curr_time_millis(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn is_blocked(&self) -> bool {
        self.rule_check_result.is_blocked()
    }

    pub fn set_round_trip(&mut self, round_trip: u64) {
        self.round_trip = round_trip
    }

    pub fn round_trip(&self) -> u64 {
        self.round_trip
    }

    pub fn set_resource(&mut self, resource: ResourceWrapper) {
        self.resource = resource;
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn set_context(&mut self, context: ContextPtr) {
        self.context = Some(context);
    }

    pub fn context(&self) -> Option<&ContextPtr> {
        self.context.as_ref()
    }

    /// the name of the call tree, empty if the entry is not bound to a context
    pub fn context_name(&self) -> &str {
        self.context.as_ref().map(|c| c.name().as_str()).unwrap_or("")
    }

    /// the caller identity, empty if unknown
    pub fn origin(&self) -> &str {
        self.context
            .as_ref()
            .map(|c| c.origin().as_str())
            .unwrap_or("")
    }

    pub fn set_default_node(&mut self, node: Arc<DefaultNode>) {
        self.default_node = Some(node);
    }

    pub fn default_node(&self) -> Option<&Arc<DefaultNode>> {
        self.default_node.as_ref()
    }

    pub fn set_cluster_node(&mut self, node: Arc<ClusterNode>) {
        self.cluster_node = Some(node);
    }

    pub fn cluster_node(&self) -> Option<&Arc<ClusterNode>> {
        self.cluster_node.as_ref()
    }

    pub fn set_origin_node(&mut self, node: Arc<StatisticNode>) {
        self.origin_node = Some(node);
    }

    pub fn origin_node(&self) -> Option<&Arc<StatisticNode>> {
        self.origin_node.as_ref()
    }

    /// the statistics of the resource for all callers
    pub fn stat_node(&self) -> Option<Arc<dyn StatNode>> {
        self.cluster_node
            .as_ref()
            .map(|n| n.stat() as Arc<dyn StatNode>)
    }

    pub fn set_input(&mut self, input: SentinelInput) {
        self.input = input;
    }

    pub fn input(&self) -> &SentinelInput {
        &self.input
    }

    pub fn set_result(&mut self, result: TokenResult) {
        self.rule_check_result = result;
    }

    pub fn reset_result_to_pass(&mut self) {
        self.rule_check_result.reset_to_pass();
    }

    pub fn result(&self) -> &TokenResult {
        &self.rule_check_result
    }

    pub fn set_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    pub fn get_err(&self) -> &Option<Error> {
        &self.err
    }

    pub(crate) fn set_entered(&mut self, entered: usize) {
        self.entered = entered;
    }

    pub(crate) fn entered(&self) -> usize {
        self.entered
    }

    /// register a handler to run before the slots exit
    pub fn when_exit(&mut self, exit_handler: ExitHandler) {
        self.exit_handlers.push(exit_handler);
    }

    pub(crate) fn take_exit_handlers(&mut self) -> Vec<ExitHandler> {
        std::mem::take(&mut self.exit_handlers)
    }
}

pub type ParamKey = String;
pub type ParamsList = Vec<ParamKey>;
pub type ParamsMap = HashMap<String, ParamKey>;

/// Input of policy algorithms
#[derive(Debug, Clone)]
pub struct SentinelInput {
    batch_count: u32,
    flag: i32,
    /// following input items are used in hotspot module
    args: Option<ParamsList>,
    attachments: Option<ParamsMap>,
}

impl Default for SentinelInput {
    fn default() -> Self {
        SentinelInput {
            batch_count: 1,
            flag: 0,
            args: None,
            attachments: None,
        }
    }
}

impl SentinelInput {
    pub fn new(batch_count: u32, flag: i32) -> Self {
        SentinelInput {
            batch_count,
            flag,
            ..Default::default()
        }
    }

    pub fn set_batch_count(&mut self, batch_count: u32) {
        self.batch_count = batch_count;
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn set_flag(&mut self, flag: i32) {
        self.flag = flag;
    }

    pub fn flag(&self) -> i32 {
        self.flag
    }

    pub fn set_args(&mut self, args: ParamsList) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&ParamsList> {
        self.args.as_ref()
    }

    pub fn set_attachments(&mut self, attachments: ParamsMap) {
        self.attachments = Some(attachments);
    }

    pub fn attachments(&self) -> Option<&ParamsMap> {
        self.attachments.as_ref()
    }
}
