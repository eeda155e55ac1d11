use crate::config::{self, ConfigEntity};
use crate::{system_metric, utils, Result};

/// init_default initializes Sentinel with the configuration from the system environment
/// and the default values.
pub fn init_default() -> Result<()> {
    init_sentinel(&mut String::new())
}

/// init_with_config initializes Sentinel with the given config entity,
/// items in the system environment still override it.
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_items_from_system_env()?;
    config::init_log()?;
    init_core_components();
    Ok(())
}

/// init_with_config_file initializes Sentinel with the given YAML file,
/// an empty path is resolved from `SENTINEL_CONFIG_FILE_PATH`.
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    init_sentinel(config_path)
}

fn init_sentinel(config_path: &mut String) -> Result<()> {
    config::init_config_with_yaml(config_path)?;
    config::init_log()?;
    init_core_components();
    Ok(())
}

// The node storage and the slots behind the global slot chain read the config on first use,
// so initialization should happen before the first entry.
fn init_core_components() {
    if config::use_cache_time() {
        utils::start_time_ticker();
    }
    system_metric::init_cpu_collector(config::cpu_stat_collec_interval_ms());
    system_metric::init_load_collector(config::load_stat_collec_interval_ms());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[ignore]
    fn with_config() {
        let mut entity = ConfigEntity::new();
        entity.config.app.app_name = "init-test".into();
        entity.config.use_cache_time = false;
        init_with_config(entity).unwrap();
        assert_eq!("init-test", config::app_name());
        assert!(!config::use_cache_time());
        config::reset_global_config(ConfigEntity::new());
    }

    #[test]
    #[ignore]
    fn invalid_config() {
        let mut entity = ConfigEntity::new();
        entity.version = String::new();
        assert!(init_with_config(entity).is_err());
    }
}
