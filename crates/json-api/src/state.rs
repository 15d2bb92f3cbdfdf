//! State

use std::sync::Arc;

use waybill_app::{auth::ServiceAuthenticator, context::AppContext, domain::fleet::FleetService};

/// Shared handler state.
#[derive(Clone)]
pub(crate) struct State {
    pub(crate) authenticator: Arc<dyn ServiceAuthenticator>,
    pub(crate) fleet: Arc<dyn FleetService>,
}

impl State {
    #[must_use]
    pub(crate) fn new(
        authenticator: Arc<dyn ServiceAuthenticator>,
        fleet: Arc<dyn FleetService>,
    ) -> Self {
        Self {
            authenticator,
            fleet,
        }
    }

    #[must_use]
    pub(crate) fn from_app_context(app: &AppContext) -> Arc<Self> {
        Arc::new(Self::new(
            Arc::clone(&app.authenticator),
            Arc::clone(&app.fleet),
        ))
    }
}
