//! Configuration, paths, and logging bootstrap for herald.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    validate_token, Config, RetryTuning, StreamWatcherConfig, StreamerEntry, DEFAULT_LOG_LEVEL,
    DEFAULT_PREFIX,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
