//! Fleet: trucks, drivers and the reassignment trail.

pub mod data;
pub mod errors;
pub mod records;
pub mod service;

pub use errors::FleetServiceError;
pub use records::*;
pub use service::*;
