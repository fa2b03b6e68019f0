// Snapshot Station - Core Library
// Exposes all modules for use in the daemon binary and tests

pub mod api;
pub mod classifier;
pub mod model;
pub mod poller;
pub mod query;
pub mod store;
pub mod temporal;

// Re-export commonly used types
pub use classifier::{classify, Classification, MAX_SNAPSHOT_AGE_SECS};
pub use model::{DiscardReason, DiscardedSnapshot, RawSnapshot, TimeRange, ValidSnapshot};
pub use poller::{PollError, Poller, TickOutcome};
pub use query::{QueryError, QueryService};
pub use store::{SnapshotStore, StoreError};
pub use temporal::{validate_range, Bound, RangeError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
