//! Tenant scoping: who a unit of work acts for and what it may see.

mod filters;
mod scope;

pub use filters::{
    FilterRegistry, FilterRegistryBuilder, Registration, RegistryError, StandingFilter,
};
pub use scope::{
    Actor, ActorUuid, Correlation, CorrelationUuid, RequestContext, SystemOperation, TenantScope,
};
