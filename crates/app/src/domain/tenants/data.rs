//! Tenant Data

use crate::domain::tenants::records::TenantUuid;

/// New Tenant Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTenant {
    /// UUID to assign to the tenant; generated when omitted.
    pub uuid: Option<TenantUuid>,

    /// Registered company name.
    pub company_name: String,

    /// Operational contact address.
    pub contact_email: String,
}
