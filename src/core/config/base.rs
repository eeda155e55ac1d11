use super::{constant::*, ConfigEntity};
use crate::{base::ResourceType, logging, utils, Error, Result};
use lazy_static::lazy_static;
use serde_yaml;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

/// replace the global config, the entity is expected to be checked already
pub fn reset_global_config(entity: ConfigEntity) {
    *GLOBAL_CONFIG.write().unwrap() = entity;
}

/// a copy of the effective global config
pub fn global_config() -> ConfigEntity {
    GLOBAL_CONFIG.read().unwrap().clone()
}

// init_config_with_yaml loads general configuration from the YAML file under provided path.
// An empty path is resolved from `SENTINEL_CONFIG_FILE_PATH`, then falls back to the defaults.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    apply_yaml_config_file(config_path)?;
    override_items_from_system_env()?;
    Ok(())
}

fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    if utils::is_blank(config_path) {
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_global_config_from_yaml_file(config_path)
}

fn load_global_config_from_yaml_file(path_str: &str) -> Result<()> {
    if path_str == CONFIG_FILENAME {
        // use the default global config
        return Ok(());
    }
    let path = Path::new(path_str);
    if !path.exists() {
        return Err(Error::msg(format!(
            "configuration file {} does not exist",
            path_str
        )));
    }
    let content = fs::read_to_string(path)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!(
        "[Config] Resolving Sentinel config from file, file {}",
        path_str
    );
    reset_global_config(entity);
    Ok(())
}

/// Items present in the system environment override the loaded ones.
pub fn override_items_from_system_env() -> Result<()> {
    let mut cfg = GLOBAL_CONFIG.read().unwrap().clone();
    if let Ok(app_name) = env::var(APP_NAME_ENV_KEY) {
        if !utils::is_blank(&app_name) {
            cfg.config.app.app_name = app_name;
        }
    }
    if let Ok(app_type) = env::var(APP_TYPE_ENV_KEY) {
        let app_type = app_type.trim().parse::<u8>().map_err(|_| {
            Error::msg(format!("invalid {}: {}", APP_TYPE_ENV_KEY, app_type))
        })?;
        cfg.config.app.app_type = app_type.into();
    }
    cfg.check()?;
    reset_global_config(cfg);
    Ok(())
}

pub fn init_log() -> Result<()> {
    logging::logger_init(log_config_file());
    logging::info!("[Config] App name resolved, appName {}", app_name());
    logging::info!(
        "[Config] Print effective global config, globalConfig {}",
        GLOBAL_CONFIG.read().unwrap()
    );
    Ok(())
}

#[inline]
pub fn log_config_file() -> Option<String> {
    let file = GLOBAL_CONFIG.read().unwrap().config.log.config_file.clone();
    if utils::is_blank(&file) {
        None
    } else {
        Some(file)
    }
}

#[inline]
pub fn app_name() -> String {
    GLOBAL_CONFIG.read().unwrap().config.app.app_name.clone()
}

#[inline]
pub fn app_type() -> ResourceType {
    GLOBAL_CONFIG.read().unwrap().config.app.app_type
}

#[inline]
pub fn load_stat_collec_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.system.load_interval_ms
}

#[inline]
pub fn cpu_stat_collec_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.system.cpu_interval_ms
}

#[inline]
pub fn use_cache_time() -> bool {
    GLOBAL_CONFIG.read().unwrap().config.use_cache_time
}

#[inline]
pub fn max_resource_amount() -> usize {
    GLOBAL_CONFIG.read().unwrap().config.stat.max_resource_amount
}

#[inline]
pub fn global_stat_interval_ms_total() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.interval_ms_total
}

#[inline]
pub fn global_stat_sample_count_total() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.sample_count_total
}

#[inline]
pub fn global_stat_bucket_length_ms() -> u32 {
    global_stat_interval_ms_total() / global_stat_sample_count_total()
}

#[inline]
pub fn metric_stat_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.interval_ms
}

#[inline]
pub fn metric_stat_sample_count() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.sample_count
}
