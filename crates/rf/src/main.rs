use std::env;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use clap::Parser;
use resource_filter::Filter;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod error;
mod input;
mod output;

use cli::Cli;
use error::{CliError, Result};
use output::StderrWarnings;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let error_json = serde_json::json!({
                    "error": {
                        "code": e.code(),
                        "message": e.to_string(),
                    }
                });
                eprintln!("{error_json:#}");
            } else {
                eprintln!("Error: {e}");
            }
            e.exit_code()
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides the flags.
fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = config::load_config()?;
    let now = cli.now.as_deref().map(config::parse_now).transpose()?;
    let env = config::build_env(&config, &cli.alias, now)?;
    let filter = Filter::compile(&cli.filter, &env)?;

    let resources = input::read_resources(cli.file.as_deref(), cli.lines)?;
    let mut warnings = StderrWarnings::new(use_colors(cli, &config), cli.quiet);
    let selected = filter.filter_values(&resources, &mut warnings)?;
    debug!(
        total = resources.len(),
        matched = selected.len(),
        warnings = warnings.distinct(),
        "filtered resources"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.count {
        output::write_count(&mut out, selected.len())?;
    } else if cli.pretty {
        output::write_pretty(&mut out, &selected)?;
    } else {
        output::write_lines(&mut out, &selected)?;
    }
    out.flush().map_err(CliError::from)
}

/// Colors are on for a terminal unless `--no-color`, `NO_COLOR` or the config turns them off.
fn use_colors(cli: &Cli, config: &config::Config) -> bool {
    !cli.no_color
        && env::var_os("NO_COLOR").is_none()
        && config.output.color.unwrap_or(true)
        && io::stderr().is_terminal()
}
