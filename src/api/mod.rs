//! mod `api` provides the topmost fundamental APIs.
//! Users should initialize Sentinel before loading rules. There are three ways to perform initialization:
//!
//!  1. `init_default()`, using default config to initialize.
//!  2. `init_with_config(config_entity: ConfigEntity)`, using customized config entity to initialize.
//!  3. `init_with_config_file(config_path: &mut String)`, using yaml file to initialize.
//!
//! Entries are built by `EntryBuilder` on the global slot chain,
//! or on an isolated one assembled by `build_slot_chain`.

mod base;
mod init;
mod slot_chain;

pub use base::*;
pub use init::*;
pub use slot_chain::*;
