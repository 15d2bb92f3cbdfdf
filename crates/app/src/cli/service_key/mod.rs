//! `service-key` subcommands.

use clap::{Args, Subcommand};

mod create;
mod disable;
mod list;

#[derive(Debug, Args)]
pub(crate) struct ServiceKeyCommand {
    #[command(subcommand)]
    action: ServiceKeyAction,
}

#[derive(Debug, Subcommand)]
enum ServiceKeyAction {
    /// Issue a key and print its secret once
    Create(create::CreateServiceKeyArgs),

    /// Print a tenant's keys without secrets
    List(list::ListServiceKeysArgs),

    /// Permanently deactivate a key
    Disable(disable::DisableServiceKeyArgs),
}

pub(crate) async fn run(command: ServiceKeyCommand) -> Result<(), String> {
    match command.action {
        ServiceKeyAction::Create(args) => create::run(args).await,
        ServiceKeyAction::List(args) => list::run(args).await,
        ServiceKeyAction::Disable(args) => disable::run(args).await,
    }
}
