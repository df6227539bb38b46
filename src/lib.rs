// ofstats - Paginated OpenFlow statistics collection
//
// Binary-side glue over the collector crates: process initialization and the
// capture replay used to exercise a full collection offline.

pub mod init;
pub mod replay;

pub use init::{init_reconciler, init_tracing};
pub use replay::{read_capture, replay, ReplayReport};
