//! # sheetstore command-line entry point
//!
//! ```text
//! main()
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialize logging (console on stderr + rolling files, console only
//!   │   when the log directory is unusable)
//!   ├─> Create Tokio runtime
//!   └─> Connect, run the subcommand, close the pool
//! ```
//!
//! ```bash
//! sheetstore init
//! sheetstore upload bundle.zip
//! sheetstore graph --table-id ab12cd34 --region Europe
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout, clippy::print_stderr)] // JSON results go to stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    if let Err(e) = sheetstore::logging::init(level) {
        eprintln!("File logging unavailable, logging to the console only: {e:#}");
        if let Err(e) = sheetstore::logging::init_console(level) {
            eprintln!("Console logging unavailable: {e:#}");
        }
    }

    tokio::runtime::Runtime::new()?.block_on(cli::run(cli))
}
