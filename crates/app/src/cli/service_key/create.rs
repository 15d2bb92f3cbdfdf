use clap::Args;
use jiff::Timestamp;
use uuid::Uuid;
use waybill_app::{
    TypedUuid,
    auth::{NewServiceApiKey, ServiceKeysService, UowServiceKeysService},
};

#[derive(Debug, Args)]
pub(crate) struct CreateServiceKeyArgs {
    /// Tenant the key acts for
    #[arg(long)]
    tenant_uuid: Uuid,

    /// Key display name
    #[arg(long)]
    name: String,

    /// Optional free-text description
    #[arg(long)]
    description: Option<String>,

    /// Optional expiry, e.g. 2027-01-01T00:00:00Z
    #[arg(long)]
    expires_at: Option<Timestamp>,

    /// Scopes such as `fleet:write`; full access when omitted
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: CreateServiceKeyArgs) -> Result<(), String> {
    let service =
        UowServiceKeysService::new(crate::cli::connect_units(&args.database_url).await?);

    let scopes = (!args.scopes.is_empty()).then_some(args.scopes);

    let issued = service
        .issue(
            TypedUuid::from_uuid(args.tenant_uuid),
            NewServiceApiKey {
                name: args.name,
                description: args.description,
                expires_at: args.expires_at,
                scopes,
            },
        )
        .await
        .map_err(|error| format!("failed to create service key: {error}"))?;

    println!("key_uuid: {}", issued.metadata.uuid);
    println!("tenant_uuid: {}", args.tenant_uuid);
    println!("service_key: {}", issued.key.as_str());
    println!("store this key now; it is only shown once");

    Ok(())
}
