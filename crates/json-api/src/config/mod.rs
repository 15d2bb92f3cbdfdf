//! Server configuration, read from arguments with environment fallbacks.

use clap::Parser;

pub(crate) mod db;
pub(crate) mod observability;
pub(crate) mod server;
pub(crate) mod tokens;
pub(crate) mod webhooks;

pub(crate) use observability::LogFormat;

use self::{
    db::DatabaseConfig,
    observability::{LoggingConfig, ObservabilityConfig},
    server::ServerRuntimeConfig,
    tokens::TokenConfig,
    webhooks::WebhooksConfig,
};

/// Waybill JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "waybill-json", about = "Waybill JSON API Server", long_about = None)]
pub struct ServerConfig {
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    #[command(flatten)]
    pub logging: LoggingConfig,

    #[command(flatten)]
    pub observability: ObservabilityConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Callback and session token signing.
    #[command(flatten)]
    pub tokens: TokenConfig,

    /// Outbound webhook delivery.
    #[command(flatten)]
    pub webhooks: WebhooksConfig,
}

impl ServerConfig {
    /// Read `.env` when present, then parse arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required setting is missing or malformed.
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }
}
