//! CLI module for revauth
//!
//! One-shot commands over the file store; JSON in on stdin, JSON out on
//! stdout, logs on stderr.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, StatusAction};
pub use commands::{init, register, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};
