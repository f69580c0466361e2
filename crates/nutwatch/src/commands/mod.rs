//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod list;
pub mod status;
pub mod vars;
pub mod watch;

use clap::CommandFactory;

use crate::cli::{Cli, Command, CompletionsArgs, GlobalOpts};
use crate::error::CliError;

/// Route a parsed subcommand to its handler. Only `list`, `status`, `vars`
/// and `watch` open a session to upsd.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    tracing::debug!(command = ?cmd, "dispatching command");
    match cmd {
        Command::List => list::handle(global).await,
        Command::Status(args) => status::handle(args, global).await,
        Command::Vars(args) => vars::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            completions(&args);
            Ok(())
        }
    }
}

fn completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_owned();
    clap_complete::generate(args.shell, &mut cmd, bin, &mut std::io::stdout());
}
