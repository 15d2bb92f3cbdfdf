//! Ordinary user-session tokens.
//!
//! Signed with the same key and issuer as callback tokens but for a different
//! audience and type marker, so neither kind is accepted in place of the other.

use std::{fmt, sync::Arc};

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        errors::TokenError,
        signing::{TokenSigner, TokenSigningConfig, check_lifetime},
    },
    clock::Clock,
    domain::tenants::TenantUuid,
};

pub const SESSION_TOKEN_TYPE: &str = "session";

pub const SESSION_TOKEN_LIFETIME: SignedDuration = SignedDuration::from_hours(2);

#[derive(Debug, Serialize, Deserialize)]
struct SessionTokenClaims {
    sub: Uuid,
    tenant_id: Uuid,
    role: String,
    token_type: String,
    jti: Uuid,
    iss: String,
    aud: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user: Uuid,
    pub tenant: TenantUuid,
    pub role: String,
}

#[derive(Clone)]
pub struct SessionTokenService {
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SessionTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenService")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl SessionTokenService {
    #[must_use]
    pub fn new(config: &TokenSigningConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            signer: TokenSigner::new(&config.secret, &config.issuer, &config.session_audience),
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the claims cannot be signed.
    pub fn issue(
        &self,
        user: Uuid,
        tenant: TenantUuid,
        role: &str,
    ) -> Result<String, TokenError> {
        let now = self.clock.now().as_second();

        self.signer
            .sign(&SessionTokenClaims {
                sub: user,
                tenant_id: tenant.into_uuid(),
                role: role.to_string(),
                token_type: SESSION_TOKEN_TYPE.to_string(),
                jti: Uuid::new_v4(),
                iss: self.signer.issuer().to_string(),
                aud: self.signer.audience().to_string(),
                iat: now,
                nbf: now,
                exp: now.saturating_add(SESSION_TOKEN_LIFETIME.as_secs()),
            })
            .map_err(TokenError::Signing)
    }

    #[must_use]
    pub fn validate(&self, token: &str) -> Option<SessionClaims> {
        let claims: SessionTokenClaims = self
            .signer
            .verify(token)
            .inspect_err(|error| debug!(error = %error, "rejected session token"))
            .ok()?;

        if claims.token_type != SESSION_TOKEN_TYPE {
            return None;
        }

        check_lifetime(self.clock.now(), claims.nbf, claims.exp).ok()?;

        Some(SessionClaims {
            user: claims.sub,
            tenant: TenantUuid::from_uuid(claims.tenant_id),
            role: claims.role,
        })
    }
}
