//! mod `authority` restricts the callers of a resource by their origin,
//! with a white list or a black list per rule.

pub mod rule;
pub mod rule_manager;
pub mod slot;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
