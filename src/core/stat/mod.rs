/// The `stat` mod implements the statistic nodes, the slots maintaining them
/// and basic data structures, such as the slding window and its underlying LeapArray
mod base;
mod cluster_builder_slot;
mod cluster_node;
mod default_node;
mod node_selector_slot;
mod node_storage;
mod stat_slot;
mod statistic_node;

pub use base::*;
pub use cluster_builder_slot::*;
pub use cluster_node::*;
pub use default_node::*;
pub use node_selector_slot::*;
pub use node_storage::*;
pub use stat_slot::*;
pub use statistic_node::*;
