//! Outcome of a slot check: pass, wait, or a typed block.

use super::{BlockError, SentinelRule, Snapshot};
use crate::{Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

type OtherBlockType = u8;

/// The kind of a block. Blocking is a normal outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Unknown,
    Flow,
    Degrade,
    System,
    Authority,
    ParamFlow,
    /// kinds of user defined slots, see `registry_block_type`
    Other(OtherBlockType),
}

impl Default for BlockType {
    fn default() -> Self {
        Self::Unknown
    }
}

lazy_static! {
    static ref OTHER_BLOCK_TYPES: RwLock<HashMap<OtherBlockType, &'static str>> =
        RwLock::new(HashMap::new());
}

const EXIST_BLOCK_ERROR: &str = "Block type existed!";

/// Names a custom `BlockType::Other` kind. The built-in kinds and ids taken before are rejected.
pub fn registry_block_type(other: BlockType, desc: &'static str) -> Result<()> {
    let id = match other {
        BlockType::Other(id) => id,
        _ => return Err(Error::msg(EXIST_BLOCK_ERROR)),
    };
    let mut registered = OTHER_BLOCK_TYPES.write().unwrap();
    if registered.contains_key(&id) {
        return Err(Error::msg(EXIST_BLOCK_ERROR));
    }
    registered.insert(id, desc);
    Ok(())
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::Other(id) => match OTHER_BLOCK_TYPES.read().unwrap().get(id) {
                Some(desc) => f.write_str(desc),
                None => write!(f, "{}", id),
            },
            builtin => write!(f, "{:?}", builtin),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenResult {
    Pass,
    Blocked(BlockError),
    /// nanoseconds to wait before passing
    Wait(u64),
}

impl Default for TokenResult {
    fn default() -> Self {
        TokenResult::Pass
    }
}

impl TokenResult {
    pub fn new_pass() -> Self {
        TokenResult::Pass
    }

    pub fn new_should_wait(nanos_to_wait: u64) -> Self {
        TokenResult::Wait(nanos_to_wait)
    }

    pub fn new_blocked(block_type: BlockType) -> Self {
        TokenResult::Blocked(BlockError::new(block_type))
    }

    pub fn new_blocked_with_msg(block_type: BlockType, block_msg: String) -> Self {
        TokenResult::Blocked(BlockError::new_with_msg(block_type, block_msg))
    }

    /// a block caused by `rule`, `snapshot_value` is the statistic that broke it
    pub fn new_blocked_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn SentinelRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        TokenResult::Blocked(BlockError::new_with_cause(
            block_type,
            block_msg,
            rule,
            snapshot_value,
        ))
    }

    pub fn reset_to_pass(&mut self) {
        *self = TokenResult::Pass;
    }

    pub fn is_pass(&self) -> bool {
        *self == TokenResult::Pass
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, TokenResult::Blocked(_))
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, TokenResult::Wait(_))
    }

    pub fn block_err(&self) -> Option<BlockError> {
        if let TokenResult::Blocked(err) = self {
            Some(err.clone())
        } else {
            None
        }
    }

    /// 0 unless the result asks to wait
    pub fn nanos_to_wait(&self) -> u64 {
        if let TokenResult::Wait(nanos) = self {
            *nanos
        } else {
            0
        }
    }
}

impl fmt::Display for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenResult::Pass => f.write_str("pass"),
            TokenResult::Blocked(err) => write!(f, "blocked ({})", err),
            TokenResult::Wait(nanos) => write!(f, "wait {} ns", nanos),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn custom_block_types() {
        registry_block_type(BlockType::Other(120), "Isolated").unwrap();
        assert_eq!("Isolated", BlockType::Other(120).to_string());
        // unnamed ids print their number
        assert_eq!("121", BlockType::Other(121).to_string());
        assert_eq!(
            EXIST_BLOCK_ERROR,
            registry_block_type(BlockType::Other(120), "Again")
                .unwrap_err()
                .to_string()
        );
        assert!(registry_block_type(BlockType::Flow, "Flow").is_err());
        assert_eq!("Authority", BlockType::Authority.to_string());
    }

    #[test]
    fn predicates() {
        let mut result = TokenResult::new_blocked_with_msg(BlockType::ParamFlow, "hot".into());
        assert!(result.is_blocked() && !result.is_pass());
        let err = result.block_err().unwrap();
        assert_eq!(BlockType::ParamFlow, err.block_type());
        assert_eq!("hot", err.block_msg());
        result.reset_to_pass();
        assert!(result.is_pass());
        assert!(result.block_err().is_none());
        assert_eq!(0, result.nanos_to_wait());

        let wait = TokenResult::new_should_wait(2_000_000);
        assert!(wait.is_wait());
        assert_eq!(2_000_000, wait.nanos_to_wait());
        assert_eq!("wait 2000000 ns", wait.to_string());
    }
}
