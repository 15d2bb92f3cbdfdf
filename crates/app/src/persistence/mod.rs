//! Tenant-aware persistence: repositories over a unit of work.

mod audit;
mod errors;
mod paging;
mod repository;
mod tracker;
mod unit_of_work;


pub use audit::AuditInterceptor;
pub use errors::{IsolationViolation, PersistenceError};
pub use paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest, SortOrder};
pub use repository::{Query, Repository};
pub use unit_of_work::{UnitOfWork, UnitOfWorkFactory};
