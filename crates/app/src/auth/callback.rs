//! Short-lived callback tokens handed to the automation host with each
//! outbound event.

use std::{fmt, sync::Arc};

use jiff::{SignedDuration, Timestamp};
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
    tenancy::CorrelationUuid,
};

/// Marker distinguishing callback tokens from user sessions.
pub const CALLBACK_TOKEN_TYPE: &str = "callback";

/// Absolute lifetime of a callback token.
pub const CALLBACK_TOKEN_LIFETIME: SignedDuration = SignedDuration::from_mins(15);

#[derive(Debug, Serialize, Deserialize)]
struct CallbackTokenClaims {
    tenant_id: Uuid,
    correlation_id: Uuid,
    token_type: String,
    jti: Uuid,
    iss: String,
    aud: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// What a valid callback token proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackClaims {
    pub tenant: TenantUuid,
    pub correlation: CorrelationUuid,
    pub expires_at: Timestamp,
}

#[derive(Clone)]
pub struct CallbackTokenService {
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CallbackTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTokenService")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl CallbackTokenService {
    #[must_use]
    pub fn new(config: &TokenSigningConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            signer: TokenSigner::new(&config.secret, &config.issuer, &config.callback_audience),
            clock,
        }
    }

    /// Mint a token for one outbound event.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be signed.
    pub fn issue(
        &self,
        tenant: TenantUuid,
        correlation: CorrelationUuid,
    ) -> Result<String, TokenError> {
        let now = self.clock.now().as_second();

        let claims = CallbackTokenClaims {
            tenant_id: tenant.into_uuid(),
            correlation_id: correlation.into_uuid(),
            token_type: CALLBACK_TOKEN_TYPE.to_string(),
            jti: Uuid::new_v4(),
            iss: self.signer.issuer().to_string(),
            aud: self.signer.audience().to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(CALLBACK_TOKEN_LIFETIME.as_secs()),
        };

        self.signer.sign(&claims).map_err(TokenError::Signing)
    }

    /// The tenant and correlation a token was minted for, or `None` for any
    /// token that is not a valid, current callback token.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<CallbackClaims> {
        match self.verify(token) {
            Ok(claims) => Some(claims),
            Err(error) => {
                debug!(error = %error, "rejected callback token");

                None
            }
        }
    }

    fn verify(&self, token: &str) -> Result<CallbackClaims, TokenError> {
        let claims: CallbackTokenClaims = self
            .signer
            .verify(token)
            .map_err(TokenError::Invalid)?;

        if claims.token_type != CALLBACK_TOKEN_TYPE {
            return Err(TokenError::WrongType {
                expected: CALLBACK_TOKEN_TYPE,
            });
        }

        check_lifetime(self.clock.now(), claims.nbf, claims.exp)?;

        Ok(CallbackClaims {
            tenant: TenantUuid::from_uuid(claims.tenant_id),
            correlation: CorrelationUuid::from_uuid(claims.correlation_id),
            expires_at: Timestamp::from_second(claims.exp).map_err(|_| TokenError::Expired)?,
        })
    }
}
