//! The `log` mod records the blocked entries through the `logging` facade.
mod slot;

pub use slot::*;
