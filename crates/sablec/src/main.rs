//! Sablec - linker and packager for Sable contracts.
//!
//! Takes methods already lowered to abstract instructions, links them into a
//! script and writes a NEF executable plus its manifest. Existing executables
//! can be optimized and inspected.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;
mod program;

#[derive(Parser)]
#[command(
    name = "sablec",
    version,
    about = "Link and package Sable contracts",
    long_about = "Sablec links lowered contract methods into NEF executables.\n\n\
                  Build:    sablec build token.json -o out/token\n\
                  Optimize: sablec optimize token.nef --manifest token.manifest.json\n\
                  Inspect:  sablec inspect token.nef"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a program description into a NEF file and manifest
    Build(commands::build::BuildCommand),

    /// Remove unreachable code from a NEF file
    Optimize(commands::optimize::OptimizeCommand),

    /// Validate a NEF file and print a disassembly
    Inspect(commands::inspect::InspectCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build(cmd) => cmd.run(&config),
        Commands::Optimize(cmd) => cmd.run(),
        Commands::Inspect(cmd) => cmd.run(),
    }
}
