//! Netsentry CLI library
//!
//! The binary in `main.rs` is a thin wrapper; every subcommand lives here so
//! integration tests can drive it without spawning a process.
//!
//! - [`cli`]: clap argument definitions
//! - [`commands`]: one handler per subcommand
//! - [`output`]: text / JSON rendering
//! - [`logging`], [`metrics_server`]: process-wide setup

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod metrics_server;
pub mod output;
