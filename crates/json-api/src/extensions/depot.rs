//! Depot helper extensions.

use std::any::Any;

use salvo::prelude::{Depot, StatusError};
use waybill_app::auth::AuthenticatedService;

use crate::auth::into_status_error;

/// Helpers for mapping depot extraction failures to HTTP errors.
pub(crate) trait DepotExt {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, StatusError>;

    /// The caller admitted by the auth middleware.
    fn authenticated_service_or_401(&self) -> Result<&AuthenticatedService, StatusError>;

    /// The admitted caller, provided it holds `scope`.
    fn service_with_scope(&self, scope: &str) -> Result<&AuthenticatedService, StatusError>;
}

impl DepotExt for Depot {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, StatusError> {
        self.obtain::<T>()
            .map_err(|_ignored| StatusError::internal_server_error())
    }

    fn authenticated_service_or_401(&self) -> Result<&AuthenticatedService, StatusError> {
        self.obtain::<AuthenticatedService>()
            .map_err(|_ignored| StatusError::unauthorized())
    }

    fn service_with_scope(&self, scope: &str) -> Result<&AuthenticatedService, StatusError> {
        let service = self.authenticated_service_or_401()?;

        service.require_scope(scope).map_err(into_status_error)?;

        Ok(service)
    }
}
