//! Package flow implements the flow shaping control.
//!
//! A flow rule limits the QPS or the concurrency of a resource.
//! The statistics it compares with are selected by the caller (`limit_origin`)
//! and by the relation of invocations (`relation_strategy`).
//!
//! The traffic shaping `Controller` consists of two part: `Calculator` and `Checker`
//!
//!  1. `Calculator` calculates the actual traffic shaping token threshold. Currently, Sentinel supports two token calculate strategy: Direct and WarmUp.
//!  2. `Checker` performs checking logic according to current metrics and the traffic shaping strategy, then yield the token result. Currently, Sentinel supports two control behavior: Reject and Throttling.
//!
//! Besides, customized `Calculator` and `Checker` are supported. Call `set_traffic_shaping_generator()` to register
//! a generator of customized controllers and `remove_traffic_shaping_generator()` to unregister it.
//! The generators of the built-in strategies can not be overridden.

pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod traffic_shaping;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use traffic_shaping::*;
