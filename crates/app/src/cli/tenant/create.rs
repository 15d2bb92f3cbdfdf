use clap::Args;
use uuid::Uuid;
use waybill_app::{
    TypedUuid,
    domain::tenants::{NewTenant, TenantsService, UowTenantsService},
    entity::Entity,
};

#[derive(Debug, Args)]
pub(crate) struct CreateTenantArgs {
    /// Registered company name
    #[arg(long)]
    company_name: String,

    /// Operational contact address
    #[arg(long)]
    contact_email: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Optional tenant UUID; generated when omitted
    #[arg(long)]
    tenant_uuid: Option<Uuid>,
}

pub(crate) async fn run(args: CreateTenantArgs) -> Result<(), String> {
    let service = UowTenantsService::new(crate::cli::connect_units(&args.database_url).await?);

    let tenant = service
        .create_tenant(NewTenant {
            uuid: args.tenant_uuid.map(TypedUuid::from_uuid),
            company_name: args.company_name,
            contact_email: args.contact_email,
        })
        .await
        .map_err(|error| format!("failed to create tenant: {error}"))?;

    println!("tenant_uuid: {}", tenant.uuid());
    println!("company_name: {}", tenant.company_name);

    Ok(())
}
