//! CLI argument parsing using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// rf - select JSON resources with a filter expression
#[derive(Parser, Debug)]
#[command(name = "rf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Filter expression (e.g., 'status:RUNNING disks.sizeGb>100')
    pub filter: String,

    /// Input file (default: stdin)
    pub file: Option<PathBuf>,

    /// Read newline-delimited JSON, one resource per line
    #[arg(short, long)]
    pub lines: bool,

    /// Print matches as an indented JSON array
    #[arg(short, long, conflicts_with = "count")]
    pub pretty: bool,

    /// Print only the number of matches
    #[arg(short, long)]
    pub count: bool,

    /// Define a key alias (repeatable), overriding the config file
    #[arg(short, long, value_name = "NAME=KEY", action = clap::ArgAction::Append)]
    pub alias: Vec<String>,

    /// Current time for relative dates (RFC 3339)
    #[arg(long, value_name = "TIMESTAMP")]
    pub now: Option<String>,

    /// Verbose output (show debug information)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no warnings)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report errors as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long)]
    pub no_color: bool,
}
