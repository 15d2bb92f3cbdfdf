//! Routes for automation hosts and other service callers.
//!
//! Everything here sits behind the auth middleware and acts for the tenant
//! the credential names.

pub(crate) mod context;
pub(crate) mod drivers;
mod errors;
pub(crate) mod trucks;

pub(crate) use errors::into_status_error;
