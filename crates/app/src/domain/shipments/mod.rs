//! Shipments and the events they raise.

pub mod data;
pub mod errors;
pub mod records;
pub mod service;

pub use errors::ShipmentsServiceError;
pub use records::*;
pub use service::*;
