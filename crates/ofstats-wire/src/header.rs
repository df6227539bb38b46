//! OpenFlow common header and frame boundaries.

use bytes::{Buf, BufMut};

use crate::error::{need, Result, WireError};

pub const OFP_VERSION_1_3: u8 = 0x04;
pub const OFP_HEADER_LEN: usize = 8;

/// Message type codes used by this codec.
pub mod msg_type {
    pub const PACKET_OUT: u8 = 13;
    pub const MULTIPART_REQUEST: u8 = 18;
    pub const MULTIPART_REPLY: u8 = 19;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfHeader {
    pub version: u8,
    pub msg_type: u8,
    /// Length of the whole message, header included
    pub length: u16,
    pub xid: u32,
}

impl OfHeader {
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        need(buf, OFP_HEADER_LEN, "header")?;
        let header = Self {
            version: buf.get_u8(),
            msg_type: buf.get_u8(),
            length: buf.get_u16(),
            xid: buf.get_u32(),
        };
        if (header.length as usize) < OFP_HEADER_LEN {
            return Err(WireError::InvalidLength {
                what: "header",
                length: header.length as usize,
            });
        }
        Ok(header)
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version);
        buf.put_u8(self.msg_type);
        buf.put_u16(self.length);
        buf.put_u32(self.xid);
    }
}

/// Length of the first complete frame in `buf`.
///
/// Returns `Ok(None)` when more bytes are needed to complete the frame.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() < OFP_HEADER_LEN {
        return Ok(None);
    }
    let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if length < OFP_HEADER_LEN {
        return Err(WireError::InvalidLength {
            what: "header",
            length,
        });
    }
    if buf.len() < length {
        return Ok(None);
    }
    Ok(Some(length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn header_encodes_big_endian() {
        let header = OfHeader {
            version: OFP_VERSION_1_3,
            msg_type: msg_type::MULTIPART_REPLY,
            length: 16,
            xid: 0x0102_0304,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[0x04, 19, 0, 16, 1, 2, 3, 4]);

        let decoded = OfHeader::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn frame_len_waits_for_complete_frame() {
        let frame = [0x04, 19, 0, 12, 0, 0, 0, 1, 0, 0];
        assert_eq!(frame_len(&frame[..4]).unwrap(), None);
        assert_eq!(frame_len(&frame).unwrap(), None);

        let full = [0x04, 19, 0, 10, 0, 0, 0, 1, 0, 0];
        assert_eq!(frame_len(&full).unwrap(), Some(10));
    }

    #[test]
    fn frame_len_rejects_short_length_field() {
        let frame = [0x04, 19, 0, 4, 0, 0, 0, 1];
        assert!(matches!(
            frame_len(&frame),
            Err(WireError::InvalidLength { .. })
        ));
    }
}
