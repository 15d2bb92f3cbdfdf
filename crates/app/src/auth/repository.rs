//! Service key lookups used while authenticating.
//!
//! Runs before the caller's tenant is known, so every call uses the narrow
//! service-key maintenance scope on its own unit of work.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::debug;

use crate::{
    auth::models::{ServiceApiKeyRecord, ServiceApiKeyUuid},
    persistence::{PersistenceError, UnitOfWork, UnitOfWorkFactory},
    tenancy::{RequestContext, SystemOperation},
};

#[automock]
#[async_trait]
pub trait ServiceKeyRepository: Send + Sync {
    /// The active, unexpired, undeleted key with this hash, if any.
    async fn find_usable_by_hash(
        &self,
        key_hash: &str,
        now: Timestamp,
    ) -> Result<Option<ServiceApiKeyRecord>, PersistenceError>;

    /// Record when and from where a key was last used.
    async fn touch_last_used(
        &self,
        key: ServiceApiKeyUuid,
        at: Timestamp,
        origin: Option<String>,
    ) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone)]
pub struct UowServiceKeyRepository {
    units: UnitOfWorkFactory,
}

impl UowServiceKeyRepository {
    #[must_use]
    pub fn new(units: UnitOfWorkFactory) -> Self {
        Self { units }
    }

    async fn unit_of_work(&self) -> Result<UnitOfWork, PersistenceError> {
        self.units
            .create(RequestContext::system(SystemOperation::ServiceKeyMaintenance))
            .await
    }
}

#[async_trait]
impl ServiceKeyRepository for UowServiceKeyRepository {
    async fn find_usable_by_hash(
        &self,
        key_hash: &str,
        now: Timestamp,
    ) -> Result<Option<ServiceApiKeyRecord>, PersistenceError> {
        let mut uow = self.unit_of_work().await?;

        let key = uow
            .service_api_keys()?
            .query()
            .field_eq("key_hash", key_hash)
            .first()
            .await?;

        Ok(key.filter(|key| key.is_usable_at(now)))
    }

    /// Only ever writes the last-used fields of a key that is still usable.
    /// Losing the race to a concurrent change skips the write.
    async fn touch_last_used(
        &self,
        key: ServiceApiKeyUuid,
        at: Timestamp,
        origin: Option<String>,
    ) -> Result<(), PersistenceError> {
        let mut uow = self.unit_of_work().await?;

        let Some(mut record) = uow
            .service_api_keys()?
            .get(key)
            .await?
            .filter(|record| record.is_usable_at(at))
        else {
            debug!(key_uuid = %key, "service key no longer usable; last use not recorded");

            return Ok(());
        };

        record.last_used_at = Some(at);
        record.last_used_from = origin;

        uow.service_api_keys()?.update(record).await?;

        match uow.save_changes().await {
            Ok(_count) => Ok(()),
            Err(PersistenceError::Stale) => {
                debug!(key_uuid = %key, "service key changed concurrently; last use not recorded");

                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}
