//! Token Config

use clap::Args;
use waybill_app::auth::TokenSigningConfig;

/// Signing settings shared by callback and session tokens.
#[derive(Debug, Args)]
pub struct TokenConfig {
    /// HMAC secret for HS256 tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Issuer written to and required on every token
    #[arg(long, env = "JWT_ISSUER", default_value = "waybill")]
    pub jwt_issuer: String,

    /// Audience of callback tokens handed to the automation host
    #[arg(long, env = "CALLBACK_AUDIENCE", default_value = "automation-callback")]
    pub callback_audience: String,

    /// Audience of user-session tokens
    #[arg(long, env = "SESSION_AUDIENCE", default_value = "waybill-client")]
    pub session_audience: String,
}

impl TokenConfig {
    #[must_use]
    pub fn signing_config(&self) -> TokenSigningConfig {
        TokenSigningConfig {
            secret: self.jwt_secret.clone(),
            issuer: self.jwt_issuer.clone(),
            callback_audience: self.callback_audience.clone(),
            session_audience: self.session_audience.clone(),
        }
    }
}
