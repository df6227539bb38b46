//! ofstats-wire - OpenFlow 1.3 codec for multipart statistics exchanges
//!
//! Covers the messages a statistics collector sends and receives: multipart
//! requests and replies, flow, port and table statistics entries, OXM matches,
//! instructions with a pluggable deserializer registry, and packet-out.

pub mod error;
pub mod flow;
pub mod header;
pub mod instruction;
pub mod message;
pub mod multipart;
pub mod oxm;
pub mod packet_out;
pub mod stats;

pub use error::{Result, WireError};
pub use flow::{frame_flow_entries, EntryFrames, FlowStatsEntry, FlowStatsRequest};
pub use header::{frame_len, OfHeader, OFP_HEADER_LEN, OFP_VERSION_1_3};
pub use instruction::{
    Action, DeserializerRegistry, Instruction, InstructionDeserializer, InstructionKey,
};
pub use message::{decode_message, encode_message, MessageBody, OfMessage};
pub use multipart::{MultipartReply, MultipartRequest, MultipartType, OFPMPF_REQ_MORE};
pub use oxm::{OxmField, OxmMatch};
pub use packet_out::{PacketOut, OFP_NO_BUFFER};
pub use stats::{frame_fixed_entries, PortStatsEntry, TableStatsEntry};

/// Reserved port numbers.
pub mod port_no {
    /// Highest number a physical or logical port may carry
    pub const MAX: u32 = 0xffff_ff00;
    pub const IN_PORT: u32 = 0xffff_fff8;
    pub const TABLE: u32 = 0xffff_fff9;
    pub const NORMAL: u32 = 0xffff_fffa;
    pub const FLOOD: u32 = 0xffff_fffb;
    pub const ALL: u32 = 0xffff_fffc;
    pub const CONTROLLER: u32 = 0xffff_fffd;
    pub const LOCAL: u32 = 0xffff_fffe;
    pub const ANY: u32 = 0xffff_ffff;
}
