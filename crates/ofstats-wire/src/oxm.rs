//! OXM (OpenFlow Extensible Match) encoding.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, Result, WireError};

pub const OFPMT_OXM: u16 = 1;
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

/// OpenFlow-basic field codes
pub mod field {
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const VLAN_VID: u8 = 6;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
    pub const TCP_SRC: u8 = 13;
    pub const TCP_DST: u8 = 14;
    pub const UDP_SRC: u8 = 15;
    pub const UDP_DST: u8 = 16;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OxmField {
    InPort(u32),
    EthDst { addr: [u8; 6], mask: Option<[u8; 6]> },
    EthSrc { addr: [u8; 6], mask: Option<[u8; 6]> },
    EthType(u16),
    VlanVid { vid: u16, mask: Option<u16> },
    IpProto(u8),
    Ipv4Src { addr: Ipv4Addr, mask: Option<Ipv4Addr> },
    Ipv4Dst { addr: Ipv4Addr, mask: Option<Ipv4Addr> },
    TcpSrc(u16),
    TcpDst(u16),
    UdpSrc(u16),
    UdpDst(u16),
    /// Any field this codec does not model, kept byte-for-byte
    Unknown {
        class: u16,
        field: u8,
        has_mask: bool,
        payload: Bytes,
    },
}

/// An OXM match structure as carried in flow-stats entries and flow mods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OxmMatch {
    pub fields: Vec<OxmField>,
}

impl OxmMatch {
    pub fn new(fields: Vec<OxmField>) -> Self {
        Self { fields }
    }

    /// Decode a match, consuming its trailing padding.
    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        need(buf, 4, "match header")?;
        let match_type = buf.get_u16();
        let length = buf.get_u16() as usize;
        if match_type != OFPMT_OXM {
            return Err(WireError::UnsupportedMatchType(match_type));
        }
        if length < 4 {
            return Err(WireError::InvalidLength {
                what: "match",
                length,
            });
        }
        let padded = padded_len(length);
        need(buf, padded - 4, "match")?;

        let mut tlvs = buf.split_to(length - 4);
        buf.advance(padded - length);

        let mut fields = Vec::new();
        while tlvs.has_remaining() {
            fields.push(decode_field(&mut tlvs)?);
        }
        Ok(Self { fields })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut tlvs = BytesMut::new();
        for field in &self.fields {
            encode_field(field, &mut tlvs);
        }
        let length = 4 + tlvs.len();
        buf.put_u16(OFPMT_OXM);
        buf.put_u16(length as u16);
        buf.put_slice(&tlvs);
        buf.put_bytes(0, padded_len(length) - length);
    }

    /// Encoded size including padding.
    pub fn encoded_len(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.len()
    }
}

fn padded_len(length: usize) -> usize {
    length.div_ceil(8) * 8
}

fn decode_field(buf: &mut Bytes) -> Result<OxmField> {
    need(buf, 4, "oxm header")?;
    let class = buf.get_u16();
    let field_and_mask = buf.get_u8();
    let len = buf.get_u8() as usize;
    let field = field_and_mask >> 1;
    let has_mask = field_and_mask & 1 == 1;
    need(buf, len, "oxm payload")?;
    let mut payload = buf.split_to(len);

    if class != OFPXMC_OPENFLOW_BASIC {
        return Ok(OxmField::Unknown {
            class,
            field,
            has_mask,
            payload,
        });
    }

    let value_len = if has_mask { len / 2 } else { len };
    let check_width = |width: usize| -> Result<()> {
        if value_len != width || (has_mask && len != width * 2) {
            return Err(WireError::InvalidLength {
                what: "oxm field",
                length: len,
            });
        }
        Ok(())
    };

    let decoded = match field {
        field::IN_PORT => {
            check_width(4)?;
            OxmField::InPort(payload.get_u32())
        }
        field::ETH_DST | field::ETH_SRC => {
            check_width(6)?;
            let addr = mac(&mut payload);
            let mask = has_mask.then(|| mac(&mut payload));
            if field == field::ETH_DST {
                OxmField::EthDst { addr, mask }
            } else {
                OxmField::EthSrc { addr, mask }
            }
        }
        field::ETH_TYPE => {
            check_width(2)?;
            OxmField::EthType(payload.get_u16())
        }
        field::VLAN_VID => {
            check_width(2)?;
            let vid = payload.get_u16();
            let mask = has_mask.then(|| payload.get_u16());
            OxmField::VlanVid { vid, mask }
        }
        field::IP_PROTO => {
            check_width(1)?;
            OxmField::IpProto(payload.get_u8())
        }
        field::IPV4_SRC | field::IPV4_DST => {
            check_width(4)?;
            let addr = Ipv4Addr::from(payload.get_u32());
            let mask = has_mask.then(|| Ipv4Addr::from(payload.get_u32()));
            if field == field::IPV4_SRC {
                OxmField::Ipv4Src { addr, mask }
            } else {
                OxmField::Ipv4Dst { addr, mask }
            }
        }
        field::TCP_SRC | field::TCP_DST | field::UDP_SRC | field::UDP_DST => {
            check_width(2)?;
            let port = payload.get_u16();
            match field {
                field::TCP_SRC => OxmField::TcpSrc(port),
                field::TCP_DST => OxmField::TcpDst(port),
                field::UDP_SRC => OxmField::UdpSrc(port),
                _ => OxmField::UdpDst(port),
            }
        }
        _ => OxmField::Unknown {
            class,
            field,
            has_mask,
            payload,
        },
    };
    Ok(decoded)
}

fn mac(buf: &mut Bytes) -> [u8; 6] {
    let mut addr = [0u8; 6];
    buf.copy_to_slice(&mut addr);
    addr
}

fn put_tlv_header(buf: &mut BytesMut, field: u8, has_mask: bool, len: usize) {
    buf.put_u16(OFPXMC_OPENFLOW_BASIC);
    buf.put_u8((field << 1) | u8::from(has_mask));
    buf.put_u8(len as u8);
}

fn encode_field(value: &OxmField, buf: &mut BytesMut) {
    match value {
        OxmField::InPort(port) => {
            put_tlv_header(buf, field::IN_PORT, false, 4);
            buf.put_u32(*port);
        }
        OxmField::EthDst { addr, mask } | OxmField::EthSrc { addr, mask } => {
            let code = if matches!(value, OxmField::EthDst { .. }) {
                field::ETH_DST
            } else {
                field::ETH_SRC
            };
            put_tlv_header(buf, code, mask.is_some(), if mask.is_some() { 12 } else { 6 });
            buf.put_slice(addr);
            if let Some(mask) = mask {
                buf.put_slice(mask);
            }
        }
        OxmField::EthType(eth_type) => {
            put_tlv_header(buf, field::ETH_TYPE, false, 2);
            buf.put_u16(*eth_type);
        }
        OxmField::VlanVid { vid, mask } => {
            put_tlv_header(buf, field::VLAN_VID, mask.is_some(), if mask.is_some() { 4 } else { 2 });
            buf.put_u16(*vid);
            if let Some(mask) = mask {
                buf.put_u16(*mask);
            }
        }
        OxmField::IpProto(proto) => {
            put_tlv_header(buf, field::IP_PROTO, false, 1);
            buf.put_u8(*proto);
        }
        OxmField::Ipv4Src { addr, mask } | OxmField::Ipv4Dst { addr, mask } => {
            let code = if matches!(value, OxmField::Ipv4Src { .. }) {
                field::IPV4_SRC
            } else {
                field::IPV4_DST
            };
            put_tlv_header(buf, code, mask.is_some(), if mask.is_some() { 8 } else { 4 });
            buf.put_u32(u32::from(*addr));
            if let Some(mask) = mask {
                buf.put_u32(u32::from(*mask));
            }
        }
        OxmField::TcpSrc(port) => {
            put_tlv_header(buf, field::TCP_SRC, false, 2);
            buf.put_u16(*port);
        }
        OxmField::TcpDst(port) => {
            put_tlv_header(buf, field::TCP_DST, false, 2);
            buf.put_u16(*port);
        }
        OxmField::UdpSrc(port) => {
            put_tlv_header(buf, field::UDP_SRC, false, 2);
            buf.put_u16(*port);
        }
        OxmField::UdpDst(port) => {
            put_tlv_header(buf, field::UDP_DST, false, 2);
            buf.put_u16(*port);
        }
        OxmField::Unknown {
            class,
            field,
            has_mask,
            payload,
        } => {
            buf.put_u16(*class);
            buf.put_u8((*field << 1) | u8::from(*has_mask));
            buf.put_u8(payload.len() as u8);
            buf.put_slice(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_match_is_padded_to_eight_bytes() {
        let mut buf = BytesMut::new();
        OxmMatch::default().encode(&mut buf);
        assert_eq!(&buf[..], &[0, 1, 0, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn decodes_typed_and_masked_fields() {
        let matcher = OxmMatch::new(vec![
            OxmField::InPort(3),
            OxmField::EthType(0x0800),
            OxmField::Ipv4Dst {
                addr: Ipv4Addr::new(10, 0, 0, 0),
                mask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            },
        ]);
        let mut buf = BytesMut::new();
        matcher.encode(&mut buf);
        assert_eq!(buf.len() % 8, 0);

        let mut bytes = buf.freeze();
        let decoded = OxmMatch::decode(&mut bytes).unwrap();
        assert_eq!(decoded, matcher);
        assert!(bytes.is_empty());
    }

    #[test]
    fn keeps_experimenter_class_fields_opaque() {
        let mut buf = BytesMut::new();
        buf.put_u16(OFPMT_OXM);
        buf.put_u16(4 + 4 + 2);
        buf.put_u16(0x0001);
        buf.put_u8(7 << 1);
        buf.put_u8(2);
        buf.put_u16(0xbeef);
        buf.put_bytes(0, 6);

        let decoded = OxmMatch::decode(&mut buf.freeze()).unwrap();
        assert_eq!(
            decoded.fields,
            vec![OxmField::Unknown {
                class: 1,
                field: 7,
                has_mask: false,
                payload: Bytes::from_static(&[0xbe, 0xef]),
            }]
        );
    }

    #[test]
    fn rejects_wrong_width_for_known_field() {
        let mut buf = BytesMut::new();
        buf.put_u16(OFPMT_OXM);
        buf.put_u16(4 + 4 + 2);
        buf.put_u16(OFPXMC_OPENFLOW_BASIC);
        buf.put_u8(field::IN_PORT << 1);
        buf.put_u8(2);
        buf.put_u16(1);
        buf.put_bytes(0, 6);

        assert!(matches!(
            OxmMatch::decode(&mut buf.freeze()),
            Err(WireError::InvalidLength { .. })
        ));
    }
}
