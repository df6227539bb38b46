// ofstats-collector - Aggregation of paginated statistics replies
//
// One logical request per (device, category) scrape. The device decides how
// many reply fragments it sends; the collector purges stale entries on the
// first fragment, merges each fragment's records through the reconciler and
// resolves once the last fragment's writes are applied.

mod collection;
mod driver;
pub mod error;
mod recent;
mod request;
mod sink;

pub use collection::{CollectionFuture, CollectionResult};
pub use driver::{AggregationDriver, FragmentDisposition};
pub use error::{CollectError, CollectFailure, Stage};
pub use sink::DeviceSink;
