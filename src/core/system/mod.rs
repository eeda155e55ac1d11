//! mod `system` provides implementation of adaptive system protection.
//! The rules are global, they guard the whole process against the inbound traffic
//! by its QPS, concurrency, average response time, system load or CPU usage.

pub mod rule;
pub mod rule_manager;
pub mod slot;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
