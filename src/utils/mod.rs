//! Shared utilities: environment, logging, signals, time

pub mod env;
pub mod logging;
pub mod signal;
pub mod time;

pub use env::{env_opt, env_or_else};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config};
pub use signal::wait_for_shutdown_signal;
pub use time::current_timestamp;
