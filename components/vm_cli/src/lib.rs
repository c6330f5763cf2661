//! Bytecode VM command line
//!
//! Provides the argument parser, the [`Runtime`] that loads and runs JSON
//! program files, and the error type for the `corten-vm` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod runtime;

pub use cli::{Cli, Command, RunArgs};
pub use error::{CliError, CliResult};
pub use runtime::{RunReport, Runtime};
