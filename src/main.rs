//! Folio - A markdown documentation builder with a live reload server.

mod build;
mod cli;
mod config;
mod core;
mod embed;
mod hooks;
mod logger;
mod reload;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::set_verbose(cli.verbose);

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Build { args } => cli::build::build_site(args),
        Commands::Serve { args } => cli::serve::serve(args),
    }
}
