//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod deploy;
pub mod login;
pub mod models;
pub mod offers;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Run a command that talks to a controller.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => login::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Models => models::handle(global).await,
        Command::Deploy(args) => deploy::handle(args, global).await,
        Command::Offers(args) => offers::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}
