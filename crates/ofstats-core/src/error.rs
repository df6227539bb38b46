use ofstats_wire::WireError;
use thiserror::Error;

use crate::model::StatCategory;

/// Failure to turn wire statistics into logical records.
///
/// Most variants describe a single record and are absorbed by the translator
/// as skip counts. `UnparseableBody` and `UnsupportedCategory` fail the
/// whole fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("malformed {category} record: {source}")]
    Malformed {
        category: StatCategory,
        #[source]
        source: WireError,
    },

    /// A port number with no connector id or reserved name
    #[error("port {port_no:#x} on {datapath_id} cannot be resolved")]
    UnresolvedPort { datapath_id: u64, port_no: u32 },

    #[error("connector '{0}' is not a valid port reference")]
    InvalidConnector(String),

    #[error("{0} statistics are not translated")]
    UnsupportedCategory(StatCategory),

    #[error("{category} reply body of {len} bytes contains no parseable entry: {source}")]
    UnparseableBody {
        category: StatCategory,
        len: usize,
        #[source]
        source: WireError,
    },

    #[error("packet out requires an egress port")]
    MissingEgress,
}
