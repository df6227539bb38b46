// ofstats-core - Pure statistics aggregation logic
//
// Everything a collector decides without touching the network or the store:
// which reply belongs to which exchange, whether a fragment opens a new
// cycle, and how wire statistics become logical records. No I/O, no async.

pub mod classify;
pub mod cycle;
pub mod error;
pub mod model;
pub mod packet_out;
pub mod ports;
pub mod translate;

pub use classify::ReplyClassifier;
pub use cycle::CycleTracker;
pub use error::TranslationError;
pub use model::{
    DeviceCategoryKey, DeviceId, FlowAction, FlowInstruction, FlowRecord, LogicalRecord,
    MatchEntry, PortRecord, StatCategory, TableRecord, UnknownCategory,
};
pub use packet_out::{to_packet_out, TransmitPacket};
pub use translate::{FragmentTranslator, SkippedRecords, Translation};
