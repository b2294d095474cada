//! Command dispatch.

pub mod check;
pub mod serve;
pub mod settings_cmd;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Serve(args) => serve::handle(args, global).await,
        Command::Check => check::handle(global),
        Command::Settings => settings_cmd::handle(global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = crate::cli::Cli::command();
            generate(args.shell, &mut cmd, "blesim", &mut std::io::stdout());
            Ok(())
        }
    }
}
