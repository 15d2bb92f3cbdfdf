use clap::Args;
use waybill_app::{
    domain::tenants::{TenantsService, UowTenantsService},
    entity::Entity,
    persistence::{DEFAULT_PAGE_SIZE, PageRequest},
};

#[derive(Debug, Args)]
pub(crate) struct ListTenantsArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Tenants per page, at most 100
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Match against company name or contact email
    #[arg(long)]
    search: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: ListTenantsArgs) -> Result<(), String> {
    let service = UowTenantsService::new(crate::cli::connect_units(&args.database_url).await?);

    let mut request = PageRequest::new(args.page, args.page_size);

    if let Some(search) = args.search {
        request = request.with_search(search);
    }

    let page = service
        .list_tenants(request)
        .await
        .map_err(|error| format!("failed to list tenants: {error}"))?;

    for tenant in &page.items {
        let status = if tenant.active { "active" } else { "inactive" };

        println!(
            "{}\t{}\t{}\t{status}",
            tenant.uuid(),
            tenant.company_name,
            tenant.contact_email
        );
    }

    println!(
        "page {} of {} ({} tenants)",
        page.page,
        page.total_pages(),
        page.total_count
    );

    Ok(())
}
