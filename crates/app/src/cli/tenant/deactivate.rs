use clap::Args;
use uuid::Uuid;
use waybill_app::{
    TypedUuid,
    domain::tenants::{TenantsService, UowTenantsService},
};

#[derive(Debug, Args)]
pub(crate) struct DeactivateTenantArgs {
    /// Tenant to deactivate
    #[arg(long)]
    tenant_uuid: Uuid,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: DeactivateTenantArgs) -> Result<(), String> {
    let service = UowTenantsService::new(crate::cli::connect_units(&args.database_url).await?);

    service
        .deactivate_tenant(TypedUuid::from_uuid(args.tenant_uuid))
        .await
        .map_err(|error| format!("failed to deactivate tenant: {error}"))?;

    println!("tenant {} deactivated", args.tenant_uuid);

    Ok(())
}
