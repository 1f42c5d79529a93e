//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use timeshift_core::config::DEFAULT_CONFIG_FILE;

/// Record radio programs from the timeshift service.
///
/// Polls the weekly catalogs of the stations in your area, records every
/// aired program a configured rule matches, then sleeps until the next
/// program it is waiting for has ended.
#[derive(Parser, Debug)]
#[command(name = "timeshift")]
#[command(author, version, about)]
pub struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Run a single cycle and exit instead of polling forever
    #[arg(long)]
    pub once: bool,
}
