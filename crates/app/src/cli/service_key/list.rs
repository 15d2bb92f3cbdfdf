use clap::Args;
use uuid::Uuid;
use waybill_app::{
    TypedUuid,
    auth::{ServiceKeysService, UowServiceKeysService},
};

#[derive(Debug, Args)]
pub(crate) struct ListServiceKeysArgs {
    /// Tenant whose keys to list
    #[arg(long)]
    tenant_uuid: Uuid,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: ListServiceKeysArgs) -> Result<(), String> {
    let service =
        UowServiceKeysService::new(crate::cli::connect_units(&args.database_url).await?);

    let keys = service
        .list(TypedUuid::from_uuid(args.tenant_uuid))
        .await
        .map_err(|error| format!("failed to list service keys: {error}"))?;

    for key in keys {
        let status = if key.active { "active" } else { "disabled" };
        let scopes = key
            .scopes
            .map_or_else(|| "*".to_string(), |scopes| scopes.join(","));
        let last_used = key
            .last_used_at
            .map_or_else(|| "never".to_string(), |at| at.to_string());

        println!("{}\t{}\t{status}\t{scopes}\t{last_used}", key.uuid, key.name);
    }

    Ok(())
}
