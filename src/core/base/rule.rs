use crate::Result;
use std::fmt;

/// Every rule kind (flow, degrade, system, authority, param flow) implements `SentinelRule`,
/// so that a `BlockError` can keep the offending rule regardless of its kind.
pub trait SentinelRule: fmt::Debug + Send + Sync {
    fn resource_name(&self) -> String;
    fn is_valid(&self) -> Result<()> {
        Ok(())
    }
}
