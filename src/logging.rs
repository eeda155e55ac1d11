//! Logging goes through the `log` facade. The backend is picked at build time:
//! `logger_env` installs `env_logger`, `logger_log4rs` reads a log4rs YAML file,
//! and without either feature the application installs its own logger.

use cfg_if::cfg_if;
use lazy_static::lazy_static;
pub use log::{debug, error, info, trace, warn};
use std::sync::Once;

lazy_static! {
    /// Guards errors that would otherwise be logged on every request.
    pub static ref FREQUENT_ERROR_ONCE: Once = Once::new();
}

cfg_if! {
    if #[cfg(feature = "logger_env")] {
        /// `RUST_LOG` overrides the default level. A logger set up earlier is left in place.
        pub fn logger_init(_: Option<String>) {
            let env = env_logger::Env::default().default_filter_or(crate::config::DEFAULT_LOG_LEVEL);
            if env_logger::Builder::from_env(env).try_init().is_err() {
                debug!("[Logging] A logger is already installed");
            }
        }
    } else if #[cfg(feature = "logger_log4rs")] {
        /// Logging stays off when the file is missing or malformed.
        pub fn logger_init(config_file: Option<String>) {
            let outcome = match config_file {
                None => Err("no configuration file given".to_string()),
                Some(file) if !std::path::Path::new(&file).exists() => {
                    Err(format!("{} does not exist", file))
                }
                Some(file) => log4rs::init_file(&file, Default::default())
                    .map_err(|err| format!("{:?}", err)),
            };
            if let Err(reason) = outcome {
                eprintln!("[Logging] log4rs is not initialized: {}", reason);
            }
        }
    } else {
        pub fn logger_init(_: Option<String>) {}
    }
}
