//! Logger initialization.
//!
//! Everything in the crate logs through the `log` facade; `init_logging` installs
//! `env_logger` behind it once per process.

mod init;

pub use init::{LoggingConfig, init_logging};
