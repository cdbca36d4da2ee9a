//! Configuration, paths and logging shared by the Sauron client crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_BASE_URL, DEFAULT_EXPIRY_HORIZON_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_REFRESH_CHECK_INTERVAL_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, LogConfig};
pub use paths::Paths;
