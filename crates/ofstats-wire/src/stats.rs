//! Fixed-size statistics entries (port and table).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, Result, WireError};
use crate::flow::EntryFrames;

pub const PORT_STATS_LEN: usize = 112;
pub const TABLE_STATS_LEN: usize = 24;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortStatsEntry {
    pub port_no: u32,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
}

impl PortStatsEntry {
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        exact(&buf, PORT_STATS_LEN, "port stats entry")?;
        let port_no = buf.get_u32();
        buf.advance(4);
        Ok(Self {
            port_no,
            rx_packets: buf.get_u64(),
            tx_packets: buf.get_u64(),
            rx_bytes: buf.get_u64(),
            tx_bytes: buf.get_u64(),
            rx_dropped: buf.get_u64(),
            tx_dropped: buf.get_u64(),
            rx_errors: buf.get_u64(),
            tx_errors: buf.get_u64(),
            rx_frame_err: buf.get_u64(),
            rx_over_err: buf.get_u64(),
            rx_crc_err: buf.get_u64(),
            collisions: buf.get_u64(),
            duration_sec: buf.get_u32(),
            duration_nsec: buf.get_u32(),
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.port_no);
        buf.put_bytes(0, 4);
        for counter in [
            self.rx_packets,
            self.tx_packets,
            self.rx_bytes,
            self.tx_bytes,
            self.rx_dropped,
            self.tx_dropped,
            self.rx_errors,
            self.tx_errors,
            self.rx_frame_err,
            self.rx_over_err,
            self.rx_crc_err,
            self.collisions,
        ] {
            buf.put_u64(counter);
        }
        buf.put_u32(self.duration_sec);
        buf.put_u32(self.duration_nsec);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStatsEntry {
    pub table_id: u8,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl TableStatsEntry {
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        exact(&buf, TABLE_STATS_LEN, "table stats entry")?;
        let table_id = buf.get_u8();
        buf.advance(3);
        Ok(Self {
            table_id,
            active_count: buf.get_u32(),
            lookup_count: buf.get_u64(),
            matched_count: buf.get_u64(),
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.table_id);
        buf.put_bytes(0, 3);
        buf.put_u32(self.active_count);
        buf.put_u64(self.lookup_count);
        buf.put_u64(self.matched_count);
    }
}

fn exact(buf: &Bytes, len: usize, what: &'static str) -> Result<()> {
    need(buf, len, what)?;
    if buf.len() != len {
        return Err(WireError::InvalidLength {
            what,
            length: buf.len(),
        });
    }
    Ok(())
}

/// Split a body of fixed-size entries. A short tail is reported, not framed.
pub fn frame_fixed_entries(body: &Bytes, entry_len: usize) -> EntryFrames {
    let whole = body.len() / entry_len;
    let frames = (0..whole)
        .map(|i| body.slice(i * entry_len..(i + 1) * entry_len))
        .collect();
    let rest = body.len() % entry_len;
    let trailing = (rest != 0).then_some(WireError::Truncated {
        what: "fixed stats entry",
        need: entry_len,
        have: rest,
    });
    EntryFrames { frames, trailing }
}
