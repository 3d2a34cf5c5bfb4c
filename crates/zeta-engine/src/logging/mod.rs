//! Logging utilities.
//!
//! The engine only talks to the `log` facade. This module installs
//! `env_logger` as the backend for binaries that want one.

mod init;

pub use init::{init_logging, LoggingConfig};
