use clap::Args;
use uuid::Uuid;
use waybill_app::{
    TypedUuid,
    auth::{ServiceKeysService, UowServiceKeysService},
};

#[derive(Debug, Args)]
pub(crate) struct DisableServiceKeyArgs {
    /// Tenant that owns the key
    #[arg(long)]
    tenant_uuid: Uuid,

    /// Key to disable
    #[arg(long)]
    key_uuid: Uuid,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: DisableServiceKeyArgs) -> Result<(), String> {
    let service =
        UowServiceKeysService::new(crate::cli::connect_units(&args.database_url).await?);

    service
        .disable(
            TypedUuid::from_uuid(args.tenant_uuid),
            TypedUuid::from_uuid(args.key_uuid),
        )
        .await
        .map_err(|error| format!("failed to disable service key: {error}"))?;

    println!("service key {} disabled", args.key_uuid);

    Ok(())
}
