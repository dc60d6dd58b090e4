//! chartcache - render chart specifications through a content-addressed cache
//!
//! Simulates a live preview host for one chart file.

use clap::Parser;
use colored::Colorize;
use std::process;

use chartcache::cli::{commands, init_logging, Cli};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    if let Err(e) = commands::execute(cli.command) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }
}
