//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    auth::{
        CallbackTokenService, CredentialAuthenticator, ServiceAuthenticator, ServiceKeysService,
        SessionTokenService, TokenSigningConfig, UowServiceKeyRepository, UowServiceKeysService,
    },
    clock::{Clock, SystemClock},
    database::{self, Db},
    domain::{
        filter_registry,
        fleet::{FleetService, UowFleetService},
        shipments::{ShipmentsService, UowShipmentsService},
        tenants::{TenantsService, UowTenantsService},
    },
    persistence::UnitOfWorkFactory,
    store::{EntityStore, PgStore},
    tenancy::RegistryError,
    webhooks::{HttpWebhookPublisher, ReqwestTransport, WebhookConfig, WebhookError, WebhookPublisher},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("database role bypasses row-level security")]
    RlsBypassed,

    #[error("failed to build the filter registry")]
    Registry(#[source] RegistryError),

    #[error("failed to build the webhook client")]
    Webhooks(#[source] WebhookError),
}

/// Everything a front end needs to serve requests.
#[derive(Clone)]
pub struct AppContext {
    pub units: UnitOfWorkFactory,
    pub tenants: Arc<dyn TenantsService>,
    pub service_keys: Arc<dyn ServiceKeysService>,
    pub fleet: Arc<dyn FleetService>,
    pub shipments: Arc<dyn ShipmentsService>,
    pub authenticator: Arc<dyn ServiceAuthenticator>,
    pub callback_tokens: CallbackTokenService,
    pub sessions: SessionTokenService,
    pub webhooks: Arc<dyn WebhookPublisher>,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the database is unreachable, the connecting role
    /// can bypass row-level security, or the webhook client cannot be built.
    pub async fn from_database_url(
        url: &str,
        signing: &TokenSigningConfig,
        webhooks: WebhookConfig,
    ) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        if database::role_bypasses_rls(&pool)
            .await
            .map_err(AppInitError::Database)?
        {
            return Err(AppInitError::RlsBypassed);
        }

        let store = Arc::new(PgStore::new(Db::new(pool)));

        Self::with_store(store, Arc::new(SystemClock), signing, webhooks)
    }

    /// Build application context over any store and clock.
    ///
    /// # Errors
    ///
    /// Returns an error when the filter registry or webhook client cannot be
    /// built.
    pub fn with_store(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        signing: &TokenSigningConfig,
        webhooks: WebhookConfig,
    ) -> Result<Self, AppInitError> {
        let registry = filter_registry().map_err(AppInitError::Registry)?;
        let units = UnitOfWorkFactory::new(store, Arc::new(registry), Arc::clone(&clock));

        let callback_tokens = CallbackTokenService::new(signing, Arc::clone(&clock));
        let sessions = SessionTokenService::new(signing, Arc::clone(&clock));

        let transport = ReqwestTransport::new(&webhooks).map_err(AppInitError::Webhooks)?;

        let webhooks: Arc<dyn WebhookPublisher> = Arc::new(HttpWebhookPublisher::new(
            webhooks,
            Arc::new(transport),
            callback_tokens.clone(),
            Arc::clone(&clock),
        ));

        let authenticator = CredentialAuthenticator::new(
            callback_tokens.clone(),
            Arc::new(UowServiceKeyRepository::new(units.clone())),
            clock,
        );

        Ok(Self {
            tenants: Arc::new(UowTenantsService::new(units.clone())),
            service_keys: Arc::new(UowServiceKeysService::new(units.clone())),
            fleet: Arc::new(UowFleetService::new(units.clone(), Arc::clone(&webhooks))),
            shipments: Arc::new(UowShipmentsService::new(units.clone(), Arc::clone(&webhooks))),
            authenticator: Arc::new(authenticator),
            callback_tokens,
            sessions,
            webhooks,
            units,
        })
    }
}
