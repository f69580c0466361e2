mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let Cli { global, command } = Cli::parse();
    init_tracing(global.verbose, global.quiet);

    match commands::dispatch(command, &global).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// Logs go to stderr so `-o json` output on stdout stays parseable.
/// `RUST_LOG` wins over `-v`; `-q` drops everything below error.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "nutwatch=info,nutwatch_core=info,warn",
        (false, 2) => "nutwatch=debug,nutwatch_core=debug,nutwatch_api=debug,info",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}
