//! Domain types for the sync engine
//!
//! Pure data types with no I/O: cursors, table descriptors, per-table sync
//! reports, and domain-level errors. Everything here is owned by the
//! orchestration layer; adapters only see these types at port boundaries.

pub mod cursor;
pub mod errors;
pub mod report;
pub mod table;

pub use cursor::{epoch, CursorStatus, SyncCursor};
pub use errors::DomainError;
pub use report::TableSyncReport;
pub use table::{TableDescriptor, TableRegistry};
