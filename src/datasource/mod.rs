//! Rule data sources.
//!
//! Rules travel as JSON arrays of rule records. A writable data source persists the rules
//! accepted by the rule update command, on a best-effort basis.

pub mod property;
pub mod writable;

pub use property::*;
pub use writable::*;

use crate::base::SentinelRule;
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
