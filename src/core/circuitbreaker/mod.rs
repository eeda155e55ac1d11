//! Circuit breaking (degrade) stops calling a resource for a while
//! once the recent calls of it are too slow or fail too often.
//! Each rule owns a circuit breaker with its own sliding window statistic,
//! see the state machine in `breaker`.

pub mod breaker;
pub mod rule;
pub mod rule_manager;
pub mod slot;

pub use breaker::*;
pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
