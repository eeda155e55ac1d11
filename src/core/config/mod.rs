//! General configuration of the guard.
//!
//! Items are resolved with the priority: system environment > YAML file > defaults,
//! and are read through the typed getters of this module.

pub mod base;
pub mod constant;
pub mod entity;

pub use base::*;
pub use constant::*;
pub use entity::*;
