//! Rule update commands.
//!
//! `ModifyRulesCommandHandler` replaces the rules of one kind with a JSON array of rule records
//! and persists them to the registered writable data source on a best-effort basis.
//! `FetchRulesCommandHandler` returns the rules of one kind as a JSON array.

mod command;
mod handler;

pub use command::*;
pub use handler::*;
