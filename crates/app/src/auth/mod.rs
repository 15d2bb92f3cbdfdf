//! Service credentials: persistent API keys and short-lived signed tokens.

pub mod authenticator;
pub mod callback;
mod errors;
pub mod keys;
pub mod models;
mod repository;
pub mod scopes;
mod service;
pub mod session;
pub(crate) mod signing;

pub use authenticator::{
    AuthenticatedService, CredentialAuthenticator, CredentialKind, MockServiceAuthenticator,
    SERVICE_KEY_HEADER, ServiceAuthenticator, ServiceCredentials,
};
pub use callback::{CallbackClaims, CallbackTokenService};
pub use errors::*;
pub use keys::{ServiceKeySecret, generate_service_key, hash_service_key};
pub use models::*;
pub use repository::{MockServiceKeyRepository, ServiceKeyRepository, UowServiceKeyRepository};
pub use scopes::ServiceScopes;
pub use service::*;
pub use session::{SessionClaims, SessionTokenService};
pub use signing::TokenSigningConfig;
