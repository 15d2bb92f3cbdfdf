//! Shared application domain and persistence modules.

pub mod auth;
pub mod clock;
pub mod context;
pub mod database;
pub mod domain;
pub mod entity;
pub mod persistence;
pub mod store;
pub mod tenancy;
pub mod webhooks;

#[cfg(test)]
mod test;

mod uuids;

pub use uuids::TypedUuid;
