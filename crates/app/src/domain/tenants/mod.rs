//! Tenants

pub mod data;
pub mod errors;
pub mod records;
pub mod service;

pub use data::NewTenant;
pub use errors::TenantsServiceError;
pub use records::{TenantRecord, TenantUuid};
pub use service::*;
