use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// RuleKind is the `type` parameter of the rule commands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    Flow,
    Degrade,
    System,
    Authority,
    ParamFlow,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Flow => "flow",
            RuleKind::Degrade => "degrade",
            RuleKind::System => "system",
            RuleKind::Authority => "authority",
            RuleKind::ParamFlow => "paramFlow",
        }
    }
}

impl FromStr for RuleKind {
    type Err = Error;

    /// case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        [
            RuleKind::Flow,
            RuleKind::Degrade,
            RuleKind::System,
            RuleKind::Authority,
            RuleKind::ParamFlow,
        ]
        .iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
        .copied()
        .ok_or_else(|| Error::msg("invalid type"))
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CommandRequest carries the parameters of a command, e.g. `type` and `data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    params: HashMap<String, String>,
}

impl CommandRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }
}

/// CommandResponse is the outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    success: bool,
    result: String,
}

impl CommandResponse {
    pub fn of_success<S: Into<String>>(result: S) -> Self {
        CommandResponse {
            success: true,
            result: result.into(),
        }
    }

    pub fn of_failure<S: Into<String>>(reason: S) -> Self {
        CommandResponse {
            success: false,
            result: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// the payload on success, the reason on failure
    pub fn result(&self) -> &str {
        &self.result
    }
}

/// CommandHandler serves one named command.
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn desc(&self) -> &'static str;
    fn handle_request(&self, request: &CommandRequest) -> CommandResponse;
}
