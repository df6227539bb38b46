//! Whole-message codec: header plus typed body.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::header::{msg_type, OfHeader, OFP_HEADER_LEN, OFP_VERSION_1_3};
use crate::multipart::{MultipartReply, MultipartRequest};
use crate::packet_out::PacketOut;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    MultipartRequest(MultipartRequest),
    MultipartReply(MultipartReply),
    PacketOut(PacketOut),
    /// Any message type this codec does not model
    Other { msg_type: u8, payload: Bytes },
}

impl MessageBody {
    fn msg_type(&self) -> u8 {
        match self {
            Self::MultipartRequest(_) => msg_type::MULTIPART_REQUEST,
            Self::MultipartReply(_) => msg_type::MULTIPART_REPLY,
            Self::PacketOut(_) => msg_type::PACKET_OUT,
            Self::Other { msg_type, .. } => *msg_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfMessage {
    pub version: u8,
    pub xid: u32,
    pub body: MessageBody,
}

impl OfMessage {
    pub fn new(xid: u32, body: MessageBody) -> Self {
        Self {
            version: OFP_VERSION_1_3,
            xid,
            body,
        }
    }

    pub fn as_multipart_reply(&self) -> Option<&MultipartReply> {
        match &self.body {
            MessageBody::MultipartReply(reply) => Some(reply),
            _ => None,
        }
    }
}

/// Decode exactly one message. Extra bytes after the frame are an error.
pub fn decode_message(frame: &[u8]) -> Result<OfMessage> {
    let mut cursor = frame;
    let header = OfHeader::decode(&mut cursor)?;
    if header.version != OFP_VERSION_1_3 {
        return Err(WireError::UnsupportedVersion(header.version));
    }
    if header.length as usize != frame.len() {
        return Err(WireError::InvalidLength {
            what: "message",
            length: header.length as usize,
        });
    }

    let payload = Bytes::copy_from_slice(&frame[OFP_HEADER_LEN..]);
    let body = match header.msg_type {
        msg_type::MULTIPART_REQUEST => {
            MessageBody::MultipartRequest(MultipartRequest::decode_body(payload)?)
        }
        msg_type::MULTIPART_REPLY => {
            MessageBody::MultipartReply(MultipartReply::decode_body(payload)?)
        }
        msg_type::PACKET_OUT => MessageBody::PacketOut(PacketOut::decode_body(payload)?),
        other => MessageBody::Other {
            msg_type: other,
            payload,
        },
    };

    Ok(OfMessage {
        version: header.version,
        xid: header.xid,
        body,
    })
}

pub fn encode_message(message: &OfMessage) -> Bytes {
    let mut body = BytesMut::new();
    match &message.body {
        MessageBody::MultipartRequest(request) => request.encode_body(&mut body),
        MessageBody::MultipartReply(reply) => reply.encode_body(&mut body),
        MessageBody::PacketOut(packet_out) => packet_out.encode_body(&mut body),
        MessageBody::Other { payload, .. } => body.extend_from_slice(payload),
    }

    let mut out = BytesMut::with_capacity(OFP_HEADER_LEN + body.len());
    OfHeader {
        version: message.version,
        msg_type: message.body.msg_type(),
        length: (OFP_HEADER_LEN + body.len()) as u16,
        xid: message.xid,
    }
    .encode(&mut out);
    out.extend_from_slice(&body);
    out.freeze()
}
