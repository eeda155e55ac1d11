use super::*;
use crate::{authority, circuitbreaker, flow, hotspot, logging, system};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// WritableDataSource persists a value, e.g. the latest rule set of one kind.
pub trait WritableDataSource<T>: Send + Sync {
    fn write(&self, value: &T) -> Result<()>;
    /// release the underlying resources
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// FileWritableDataSource writes the rules to a local file,
/// replacing its content on every write.
pub struct FileWritableDataSource<P: SentinelRule> {
    path: PathBuf,
    encoder: PropertyEncoder<P>,
    write_lock: Mutex<()>,
}

impl<P: SentinelRule + Serialize> FileWritableDataSource<P> {
    /// a data source writing JSON arrays to `path`
    pub fn new<F: AsRef<Path>>(path: F) -> Result<Self> {
        Self::with_encoder(path, rule_json_array_encoder::<P>)
    }
}

impl<P: SentinelRule> FileWritableDataSource<P> {
    pub fn with_encoder<F: AsRef<Path>>(path: F, encoder: PropertyEncoder<P>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(Error::msg(format!(
                "{} is a directory, not a file",
                path.display()
            )));
        }
        Ok(FileWritableDataSource {
            path,
            encoder,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<P: SentinelRule> WritableDataSource<Vec<Arc<P>>> for FileWritableDataSource<P> {
    fn write(&self, value: &Vec<Arc<P>>) -> Result<()> {
        let content = (self.encoder)(value)?;
        let _guard = self.write_lock.lock().unwrap();
        fs::write(&self.path, content)?;
        logging::debug!(
            "[FileWritableDataSource] Rules written to {}",
            self.path.display()
        );
        Ok(())
    }
}

pub type RuleDataSource<P> = Arc<dyn WritableDataSource<Vec<Arc<P>>>>;

lazy_static! {
    static ref DEFAULT_WRITABLE_DATA_SOURCE_REGISTRY: Arc<WritableDataSourceRegistry> =
        Arc::new(WritableDataSourceRegistry::new());
}

/// the registry used by the default rule update command
pub fn default_writable_data_source_registry() -> Arc<WritableDataSourceRegistry> {
    DEFAULT_WRITABLE_DATA_SOURCE_REGISTRY.clone()
}

/// WritableDataSourceRegistry holds at most one writable data source per rule kind.
#[derive(Default)]
pub struct WritableDataSourceRegistry {
    flow: RwLock<Option<RuleDataSource<flow::Rule>>>,
    degrade: RwLock<Option<RuleDataSource<circuitbreaker::Rule>>>,
    system: RwLock<Option<RuleDataSource<system::Rule>>>,
    authority: RwLock<Option<RuleDataSource<authority::Rule>>>,
    param_flow: RwLock<Option<RuleDataSource<hotspot::Rule>>>,
}

macro_rules! data_source_accessors {
    ($field:ident, $register:ident, $get:ident, $rule:ty) => {
        pub fn $register(&self, data_source: Option<RuleDataSource<$rule>>) {
            *self.$field.write().unwrap() = data_source;
        }

        pub fn $get(&self) -> Option<RuleDataSource<$rule>> {
            self.$field.read().unwrap().clone()
        }
    };
}

impl WritableDataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    data_source_accessors!(flow, register_flow_data_source, flow_data_source, flow::Rule);
    data_source_accessors!(
        degrade,
        register_degrade_data_source,
        degrade_data_source,
        circuitbreaker::Rule
    );
    data_source_accessors!(
        system,
        register_system_data_source,
        system_data_source,
        system::Rule
    );
    data_source_accessors!(
        authority,
        register_authority_data_source,
        authority_data_source,
        authority::Rule
    );
    data_source_accessors!(
        param_flow,
        register_param_flow_data_source,
        param_flow_data_source,
        hotspot::Rule
    );
}
