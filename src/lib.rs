#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Sentinel Guard
//!
//! In-process traffic protection: flow control, circuit breaking,
//! system adaptive protection, caller authority and hot parameter limiting.
//!
//! Every invocation of a protected resource creates an entry, which traverses an ordered chain of slots:
//! NodeSelector, ClusterBuilder, Log, Statistic, ParamFlow, System, Authority, Flow and Degrade.
//! The first slot to block stops the traversal, and the slots already entered are exited in reverse order,
//! whether the entry passed or not.
//!
//! ## General Configurations and Initialization
//!
//! The `api` module provides the following interfaces:
//!
//! - `init_default()`: Load configurations from environment variable. For undefined configurations, use default values.
//! - `init_with_config_file(config_path: &mut String)`: Load configurations from a YAML file.
//! - `init_with_config(config_entity: ConfigEntity)`: Use hand-crafted `ConfigEntity` to initialize.
//!
//! Optional features:
//! - logger_env: Use `env_logger` to initialize logging.
//! - logger_log4rs: Use `log4rs` to initialize logging.
//!
//! ## Resource Definition
//!
//! By constructing `EntryBuilder` and calling the `build()` method, we create an entry.
//! If the calling is blocked, `build()` returns the `BlockError` carrying the kind of the block,
//! the rule and the statistic value that triggered it.
//!
//! ```rust
//! use sentinel_guard::{base, EntryBuilder};
//! let entry_builder = EntryBuilder::new("some_api".into())
//!     .with_traffic_type(base::TrafficType::Inbound);
//! match entry_builder.build() {
//!     Ok(entry) => {
//!         // The request is allowed to be processed.
//!         // after finish the logic, exit the entry.
//!         entry.exit()
//!     }
//!     Err(block_error) => {
//!         // The request is blocked.
//!         // you do not need to call `exit()` on entry now.
//!     }
//! }
//! ```
//!
//! ## Load Rules
//!
//! The method `load_rules()` replaces all of the rules of a kind at once,
//! the method `append_rules()` appends rules incrementally.
//!
//! ```rust
//! flow::load_rules(vec![Arc::new(flow::Rule {
//!     resource: "some_api".into(),
//!     threshold: 10.0,
//!     calculate_strategy: flow::CalculateStrategy::Direct,
//!     control_strategy: flow::ControlStrategy::Reject,
//!     ..Default::default()
//! })]);
//! ```
//!
//! Rules may also be replaced remotely with the `setRules` command of the `transport` module,
//! which takes the rule kind and a JSON array of rules.

/// Entry API, initialization and slot chain assembly.
pub mod api;
/// Core implementations, including the statistic structures,
/// such as the slding window and its underlying LeapArray, the rule managers and the slots,
/// and other utilities on configuration.
pub mod core;
/// Rule serialization and writable data sources.
pub mod datasource;
/// Adapters for different logging crates.
pub mod logging;
/// Rule update commands.
pub mod transport;
// Utility functions.
pub mod utils;

// re-export precludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
