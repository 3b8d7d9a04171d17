//! Terminal host for `todo-core`.
//!
//! # Overview
//! Supplies everything the core leaves to its host: configuration, an HTTP
//! executor, durable session storage, a clock and a line-oriented shell that
//! draws the current view.

pub mod commands;
pub mod config;
pub mod render;
pub mod shell;
pub mod storage;
pub mod transport;

pub use config::{Config, ConfigError, Overrides};
pub use shell::{run, Shell};
pub use storage::{SessionFile, StorageError};
pub use transport::Executor;
