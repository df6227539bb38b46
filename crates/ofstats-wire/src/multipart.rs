//! Multipart request and reply framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, Result};
use crate::flow::FlowStatsRequest;
use crate::port_no;

/// Flag set by the device on every reply fragment that has a successor
pub const OFPMPF_REQ_MORE: u16 = 0x0001;

pub const OFPG_ALL: u32 = 0xffff_fffc;
pub const OFPM_ALL: u32 = 0xffff_ffff;
pub const OFPQ_ALL: u32 = 0xffff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultipartType {
    Desc,
    Flow,
    Aggregate,
    Table,
    PortStats,
    Queue,
    Group,
    GroupDesc,
    GroupFeatures,
    Meter,
    MeterConfig,
    MeterFeatures,
    TableFeatures,
    PortDesc,
    Experimenter,
    Unknown(u16),
}

impl MultipartType {
    pub fn code(&self) -> u16 {
        match self {
            Self::Desc => 0,
            Self::Flow => 1,
            Self::Aggregate => 2,
            Self::Table => 3,
            Self::PortStats => 4,
            Self::Queue => 5,
            Self::Group => 6,
            Self::GroupDesc => 7,
            Self::GroupFeatures => 8,
            Self::Meter => 9,
            Self::MeterConfig => 10,
            Self::MeterFeatures => 11,
            Self::TableFeatures => 12,
            Self::PortDesc => 13,
            Self::Experimenter => 0xffff,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<u16> for MultipartType {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::Desc,
            1 => Self::Flow,
            2 => Self::Aggregate,
            3 => Self::Table,
            4 => Self::PortStats,
            5 => Self::Queue,
            6 => Self::Group,
            7 => Self::GroupDesc,
            8 => Self::GroupFeatures,
            9 => Self::Meter,
            10 => Self::MeterConfig,
            11 => Self::MeterFeatures,
            12 => Self::TableFeatures,
            13 => Self::PortDesc,
            0xffff => Self::Experimenter,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartRequest {
    pub mp_type: MultipartType,
    pub flags: u16,
    pub body: Bytes,
}

impl MultipartRequest {
    pub fn flow_stats(request: &FlowStatsRequest) -> Self {
        let mut body = BytesMut::new();
        request.encode(&mut body);
        Self {
            mp_type: MultipartType::Flow,
            flags: 0,
            body: body.freeze(),
        }
    }

    pub fn port_stats(port: u32) -> Self {
        Self::with_selector(MultipartType::PortStats, port, 0)
    }

    pub fn table_stats() -> Self {
        Self {
            mp_type: MultipartType::Table,
            flags: 0,
            body: Bytes::new(),
        }
    }

    pub fn group_stats(group_id: u32) -> Self {
        Self::with_selector(MultipartType::Group, group_id, 0)
    }

    pub fn meter_stats(meter_id: u32) -> Self {
        Self::with_selector(MultipartType::Meter, meter_id, 0)
    }

    pub fn queue_stats(port: u32, queue_id: u32) -> Self {
        Self::with_selector(MultipartType::Queue, port, queue_id)
    }

    /// Request body made of one 32-bit selector and a second 32-bit word.
    fn with_selector(mp_type: MultipartType, selector: u32, second: u32) -> Self {
        let mut body = BytesMut::with_capacity(8);
        body.put_u32(selector);
        body.put_u32(second);
        Self {
            mp_type,
            flags: 0,
            body: body.freeze(),
        }
    }

    /// Request every port
    pub fn all_ports() -> Self {
        Self::port_stats(port_no::ANY)
    }

    pub(crate) fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.mp_type.code());
        buf.put_u16(self.flags);
        buf.put_bytes(0, 4);
        buf.put_slice(&self.body);
    }

    pub(crate) fn decode_body(mut buf: Bytes) -> Result<Self> {
        need(&buf, 8, "multipart request")?;
        let mp_type = MultipartType::from(buf.get_u16());
        let flags = buf.get_u16();
        buf.advance(4);
        Ok(Self {
            mp_type,
            flags,
            body: buf,
        })
    }
}

/// One reply fragment. `body` holds the packed, category-specific entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartReply {
    pub mp_type: MultipartType,
    pub flags: u16,
    pub body: Bytes,
}

impl MultipartReply {
    /// Whether the device announced further fragments for this exchange.
    pub fn request_more(&self) -> bool {
        self.flags & OFPMPF_REQ_MORE != 0
    }

    pub(crate) fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.mp_type.code());
        buf.put_u16(self.flags);
        buf.put_bytes(0, 4);
        buf.put_slice(&self.body);
    }

    pub(crate) fn decode_body(mut buf: Bytes) -> Result<Self> {
        need(&buf, 8, "multipart reply")?;
        let mp_type = MultipartType::from(buf.get_u16());
        let flags = buf.get_u16();
        buf.advance(4);
        Ok(Self {
            mp_type,
            flags,
            body: buf,
        })
    }
}
