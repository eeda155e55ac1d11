use super::{BlockType, SentinelRule};
use crate::utils;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The value that triggered a block, e.g. the QPS of a node or the state of a breaker.
pub trait SnapshotTrait: Any + fmt::Debug + utils::AsAny + Send + Sync {}
impl<T: Any + fmt::Debug + utils::AsAny + Send + Sync> SnapshotTrait for T {}
pub type Snapshot = dyn SnapshotTrait;

/// BlockError indicates the request was blocked by a slot.
/// It carries the block kind, the offending rule and the snapshot value of the node
/// that triggered the block.
#[derive(Debug, Clone, Default)]
pub struct BlockError {
    block_type: BlockType,
    /// additional message for the block error.
    block_msg: String,
    rule: Option<Arc<dyn SentinelRule>>,
    /// the triggered "snapshot" value
    snapshot_value: Option<Arc<Snapshot>>,
}

impl PartialEq for BlockError {
    fn eq(&self, other: &BlockError) -> bool {
        self.block_type == other.block_type && self.block_msg == other.block_msg
    }
}

impl BlockError {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            ..Self::default()
        }
    }

    pub fn new_with_msg(block_type: BlockType, block_msg: String) -> Self {
        Self {
            block_type,
            block_msg,
            ..Self::default()
        }
    }

    pub fn new_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn SentinelRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        Self {
            block_type,
            block_msg,
            rule: Some(rule),
            snapshot_value: Some(snapshot_value),
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn block_msg(&self) -> String {
        self.block_msg.clone()
    }

    pub fn triggered_rule(&self) -> Option<Arc<dyn SentinelRule>> {
        self.rule.clone()
    }

    pub fn triggered_value(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_value.clone()
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.block_msg.is_empty() {
            write!(f, "SentinelBlockError: {}", self.block_type)
        } else {
            write!(
                f,
                "SentinelBlockError: {}, message: {}",
                self.block_type, self.block_msg
            )
        }
    }
}

impl std::error::Error for BlockError {}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Default)]
    struct MockRule {}

    impl SentinelRule for MockRule {
        fn resource_name(&self) -> String {
            "mock resource".into()
        }
    }

    #[test]
    fn error_with_cause() {
        let rule = Arc::new(MockRule {});
        let snapshot = Arc::new(String::from("snapshot"));
        let err = BlockError::new_with_cause(
            BlockType::Flow,
            "mock msg".into(),
            rule.clone(),
            snapshot.clone(),
        );
        assert_eq!(BlockType::Flow, err.block_type());
        assert_eq!("mock msg", err.block_msg());
        assert_eq!(
            "mock resource",
            err.triggered_rule().unwrap().resource_name()
        );
        let value = err.triggered_value().unwrap().as_any_arc();
        assert_eq!("snapshot", *value.downcast::<String>().unwrap());
    }

    #[test]
    fn display() {
        assert_eq!(
            "SentinelBlockError: Degrade",
            BlockError::new(BlockType::Degrade).to_string()
        );
        assert_eq!(
            "SentinelBlockError: System, message: load too high",
            BlockError::new_with_msg(BlockType::System, "load too high".into()).to_string()
        );
    }

    #[test]
    fn into_anyhow() {
        let err: crate::Error = BlockError::new(BlockType::Flow).into();
        assert!(err.downcast_ref::<BlockError>().is_some());
    }
}
