//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gradwatch",
    about = "Graduation detection and state reconciliation for bonding-curve launchpad tokens",
    version
)]
pub struct CliApp {
    /// Log at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the reconciliation service
    Run(RunCmd),
    /// Look up one token on the launchpad index and print its record
    Lookup(LookupCmd),
}

#[derive(Args)]
pub struct RunCmd {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Args)]
pub struct LookupCmd {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Token address (0x-prefixed)
    pub address: String,
}
