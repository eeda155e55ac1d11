//! mod `base` holds the fundamental abstractions shared by every slot:
//! resources, rules, check results, statistic traits, the call context and the slot chain.

pub mod block_error;
pub mod constant;
pub mod context;
pub mod entry;
pub mod resource;
pub mod result;
pub mod rule;
pub mod slot_chain;
pub mod stat;

pub use block_error::*;
pub use constant::*;
pub use context::*;
pub use entry::*;
pub use resource::*;
pub use result::*;
pub use rule::*;
pub use slot_chain::*;
pub use stat::*;
