//! Core application infrastructure: CLI, configuration, lifecycle

pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;

pub use shutdown::ShutdownService;
