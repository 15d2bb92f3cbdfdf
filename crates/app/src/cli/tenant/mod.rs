//! `tenant` subcommands.

use clap::{Args, Subcommand};

mod create;
mod deactivate;
mod list;

#[derive(Debug, Args)]
pub(crate) struct TenantCommand {
    #[command(subcommand)]
    action: TenantAction,
}

#[derive(Debug, Subcommand)]
enum TenantAction {
    /// Provision a new tenant
    Create(create::CreateTenantArgs),

    /// Print one page of tenants
    List(list::ListTenantsArgs),

    /// Stop a tenant from gaining new rows
    Deactivate(deactivate::DeactivateTenantArgs),
}

pub(crate) async fn run(command: TenantCommand) -> Result<(), String> {
    match command.action {
        TenantAction::Create(args) => create::run(args).await,
        TenantAction::List(args) => list::run(args).await,
        TenantAction::Deactivate(args) => deactivate::run(args).await,
    }
}
