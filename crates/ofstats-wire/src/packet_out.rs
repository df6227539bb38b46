use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, Result, WireError};
use crate::instruction::{decode_actions, encode_actions, Action};

/// Buffer id meaning "the packet bytes travel in the message itself"
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub data: Bytes,
}

impl PacketOut {
    pub(crate) fn encode_body(&self, buf: &mut BytesMut) {
        let mut actions = BytesMut::new();
        encode_actions(&self.actions, &mut actions);
        buf.put_u32(self.buffer_id);
        buf.put_u32(self.in_port);
        buf.put_u16(actions.len() as u16);
        buf.put_bytes(0, 6);
        buf.put_slice(&actions);
        buf.put_slice(&self.data);
    }

    pub(crate) fn decode_body(mut buf: Bytes) -> Result<Self> {
        need(&buf, 16, "packet out")?;
        let buffer_id = buf.get_u32();
        let in_port = buf.get_u32();
        let actions_len = buf.get_u16() as usize;
        buf.advance(6);
        if actions_len > buf.remaining() {
            return Err(WireError::InvalidLength {
                what: "packet out actions",
                length: actions_len,
            });
        }
        let actions = decode_actions(buf.split_to(actions_len))?;
        Ok(Self {
            buffer_id,
            in_port,
            actions,
            data: buf,
        })
    }
}
