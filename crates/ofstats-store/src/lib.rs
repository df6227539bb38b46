// ofstats-store - Statistics cache and its reconciliation
//
// The store boundary is the `StatsStore` trait: keyed upsert, delete-range and
// read over a (device, category) key. The `Reconciler` layers per-key write
// ordering on top, since stores only promise per-write atomicity.

pub mod error;
mod init;
mod opendal_store;
mod reconciler;
mod store;

pub use error::{ErrorCode, Result, StoreError};
pub use init::initialize_store;
pub use opendal_store::OpendalStore;
pub use reconciler::{Reconciler, WriteHandle, WriteKind};
pub use store::{MemoryStore, StatsStore};
