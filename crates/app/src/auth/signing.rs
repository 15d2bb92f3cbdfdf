//! HS256 signing shared by callback and session tokens.

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::auth::errors::TokenError;

/// Tolerance applied to `nbf` and `exp`.
pub const CLOCK_SKEW: SignedDuration = SignedDuration::from_secs(30);

/// Signing key, issuer and the two audiences tokens may be minted for.
#[derive(Clone)]
pub struct TokenSigningConfig {
    pub secret: String,
    pub issuer: String,
    pub callback_audience: String,
    pub session_audience: String,
}

impl fmt::Debug for TokenSigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigningConfig")
            .field("secret", &"**redacted**")
            .field("issuer", &self.issuer)
            .field("callback_audience", &self.callback_audience)
            .field("session_audience", &self.session_audience)
            .finish()
    }
}

/// Signs and verifies claims for one audience.
#[derive(Clone)]
pub(crate) struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub(crate) fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    pub(crate) fn issuer(&self) -> &str {
        &self.issuer
    }

    pub(crate) fn audience(&self) -> &str {
        &self.audience
    }

    pub(crate) fn sign<C: Serialize>(&self, claims: &C) -> Result<String, Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Verify signature, algorithm, issuer and audience. Lifetime is checked
    /// separately against the injected clock.
    pub(crate) fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, Error> {
        let mut validation = Validation::new(Algorithm::HS256);

        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        decode::<C>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Check `nbf <= now <= exp` with [`CLOCK_SKEW`] on both ends.
pub(crate) fn check_lifetime(
    now: Timestamp,
    not_before: i64,
    expires: i64,
) -> Result<(), TokenError> {
    let now = now.as_second();
    let skew = CLOCK_SKEW.as_secs();

    if now.saturating_add(skew) < not_before {
        return Err(TokenError::NotYetValid);
    }

    if now.saturating_sub(skew) > expires {
        return Err(TokenError::Expired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_allows_skew_on_both_ends() {
        let at = |second| Timestamp::from_second(second).unwrap_or(Timestamp::UNIX_EPOCH);

        assert!(check_lifetime(at(1_000), 1_000, 1_900).is_ok());
        assert!(check_lifetime(at(970), 1_000, 1_900).is_ok());
        assert!(check_lifetime(at(969), 1_000, 1_900).is_err());
        assert!(check_lifetime(at(1_930), 1_000, 1_900).is_ok());
        assert!(matches!(
            check_lifetime(at(1_931), 1_000, 1_900),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = TokenSigningConfig {
            secret: "super-secret-signing-key".to_string(),
            issuer: "waybill".to_string(),
            callback_audience: "automation-callback".to_string(),
            session_audience: "waybill-client".to_string(),
        };

        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
