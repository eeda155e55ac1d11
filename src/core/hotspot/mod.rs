//! `hotspot` mod provides implementation of "hot-spot" (frequent) parameter flow control.
//! The statistics are kept per value of one argument of the entry,
//! in counters bounded by an LRU policy.

pub mod cache;
pub mod param_metric;
pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod traffic_shaping;

pub use cache::*;
pub use param_metric::*;
pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use traffic_shaping::*;
