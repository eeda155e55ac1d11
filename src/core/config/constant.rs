use crate::base::ResourceType;

/// the only config format version understood so far
pub const SENTINEL_VERSION: &str = "v1";

pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const DEFAULT_APP_TYPE: ResourceType = ResourceType::Common;

/// Environment variables, they override the YAML file.
pub const APP_NAME_ENV_KEY: &str = "SENTINEL_APP_NAME";
pub const APP_TYPE_ENV_KEY: &str = "SENTINEL_APP_TYPE";
pub const CONF_FILE_PATH_ENV_KEY: &str = "SENTINEL_CONFIG_FILE_PATH";

/// path placeholder meaning "no file, keep the defaults"
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

/// collecting intervals of the system metric collectors
pub const LOAD_INTERVAL_MS: u32 = 1000;
pub const CPU_INTERVAL_MS: u32 = 1000;

/// cold factor of a warm-up flow rule that leaves it unset
pub const WARM_UP_COLD_FACTOR: u32 = 3;

/// level of the env_logger backend when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "warn";
/// log4rs configuration of the logger_log4rs backend
pub const LOG_CONFIG_FILE: &str = "testdata/config/log4rs.yaml";
