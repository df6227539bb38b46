//! Flow statistics request and entry codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, Result, WireError};
use crate::instruction::{DeserializerRegistry, Instruction};
use crate::oxm::OxmMatch;
use crate::port_no;

/// Fixed part of a flow-stats entry preceding its match
pub const FLOW_STATS_FIXED_LEN: usize = 48;
/// Fixed part plus the smallest (empty, padded) match
pub const FLOW_STATS_MIN_LEN: usize = FLOW_STATS_FIXED_LEN + 8;

pub const OFPTT_ALL: u8 = 0xff;
pub const OFPG_ANY: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStatsRequest {
    pub table_id: u8,
    pub out_port: u32,
    pub out_group: u32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub match_: OxmMatch,
}

impl Default for FlowStatsRequest {
    /// Every flow in every table.
    fn default() -> Self {
        Self {
            table_id: OFPTT_ALL,
            out_port: port_no::ANY,
            out_group: OFPG_ANY,
            cookie: 0,
            cookie_mask: 0,
            match_: OxmMatch::default(),
        }
    }
}

impl FlowStatsRequest {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.table_id);
        buf.put_bytes(0, 3);
        buf.put_u32(self.out_port);
        buf.put_u32(self.out_group);
        buf.put_bytes(0, 4);
        buf.put_u64(self.cookie);
        buf.put_u64(self.cookie_mask);
        self.match_.encode(buf);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStatsEntry {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub match_: OxmMatch,
    pub instructions: Vec<Instruction>,
}

impl FlowStatsEntry {
    /// Decode one framed entry (as produced by [`frame_flow_entries`]).
    pub fn decode(frame: Bytes, version: u8, registry: &DeserializerRegistry) -> Result<Self> {
        let mut buf = frame;
        need(&buf, FLOW_STATS_MIN_LEN, "flow stats entry")?;
        let length = buf.get_u16() as usize;
        if length != buf.remaining() + 2 {
            return Err(WireError::InvalidLength {
                what: "flow stats entry",
                length,
            });
        }
        let table_id = buf.get_u8();
        buf.advance(1);
        let duration_sec = buf.get_u32();
        let duration_nsec = buf.get_u32();
        let priority = buf.get_u16();
        let idle_timeout = buf.get_u16();
        let hard_timeout = buf.get_u16();
        let flags = buf.get_u16();
        buf.advance(4);
        let cookie = buf.get_u64();
        let packet_count = buf.get_u64();
        let byte_count = buf.get_u64();
        let match_ = OxmMatch::decode(&mut buf)?;
        let instructions = registry.decode_instructions(version, buf)?;

        Ok(Self {
            table_id,
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            flags,
            cookie,
            packet_count,
            byte_count,
            match_,
            instructions,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut tail = BytesMut::new();
        self.match_.encode(&mut tail);
        for instruction in &self.instructions {
            instruction.encode(&mut tail);
        }

        buf.put_u16((FLOW_STATS_FIXED_LEN + tail.len()) as u16);
        buf.put_u8(self.table_id);
        buf.put_u8(0);
        buf.put_u32(self.duration_sec);
        buf.put_u32(self.duration_nsec);
        buf.put_u16(self.priority);
        buf.put_u16(self.idle_timeout);
        buf.put_u16(self.hard_timeout);
        buf.put_u16(self.flags);
        buf.put_bytes(0, 4);
        buf.put_u64(self.cookie);
        buf.put_u64(self.packet_count);
        buf.put_u64(self.byte_count);
        buf.put_slice(&tail);
    }
}

/// Entries split out of a reply body, plus the reason framing stopped early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFrames {
    pub frames: Vec<Bytes>,
    /// Set when bytes remained that could not be framed as an entry
    pub trailing: Option<WireError>,
}

/// Split a flow-stats reply body into length-delimited entries.
///
/// Framing stops at the first length field that is too small or runs past the
/// end of the body; the frames before it are still returned.
pub fn frame_flow_entries(body: &Bytes) -> EntryFrames {
    let mut out = EntryFrames::default();
    let mut offset = 0;
    while offset < body.len() {
        let remaining = body.len() - offset;
        if remaining < 2 {
            out.trailing = Some(WireError::Truncated {
                what: "flow stats entry",
                need: 2,
                have: remaining,
            });
            break;
        }
        let length = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
        if length < FLOW_STATS_MIN_LEN {
            out.trailing = Some(WireError::InvalidLength {
                what: "flow stats entry",
                length,
            });
            break;
        }
        if length > remaining {
            out.trailing = Some(WireError::Truncated {
                what: "flow stats entry",
                need: length,
                have: remaining,
            });
            break;
        }
        out.frames.push(body.slice(offset..offset + length));
        offset += length;
    }
    out
}
