use std::sync::Arc;

use clap::{Parser, Subcommand};
use waybill_app::{
    clock::SystemClock,
    database::{self, Db},
    domain::filter_registry,
    persistence::UnitOfWorkFactory,
    store::PgStore,
};

mod db;
mod service_key;
mod tenant;

#[derive(Debug, Parser)]
#[command(name = "waybill-app", about = "Waybill CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Tenant(tenant::TenantCommand),
    ServiceKey(service_key::ServiceKeyCommand),
    Db(db::DbCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Tenant(command) => tenant::run(command).await,
            Commands::ServiceKey(command) => service_key::run(command).await,
            Commands::Db(command) => db::run(command).await,
        }
    }
}

/// Units of work over the PostgreSQL store at `database_url`.
async fn connect_units(database_url: &str) -> Result<UnitOfWorkFactory, String> {
    let pool = database::connect(database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let registry =
        filter_registry().map_err(|error| format!("failed to build filter registry: {error}"))?;

    Ok(UnitOfWorkFactory::new(
        Arc::new(PgStore::new(Db::new(pool))),
        Arc::new(registry),
        Arc::new(SystemClock),
    ))
}
