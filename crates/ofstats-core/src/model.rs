//! Device-independent statistics model.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ofstats_wire::MultipartType;
use serde::{Deserialize, Serialize};

use crate::error::TranslationError;

const NODE_PREFIX: &str = "openflow:";

/// Inventory node id of an OpenFlow device: `openflow:<datapath-id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId {
    datapath_id: u64,
}

impl DeviceId {
    pub fn new(datapath_id: u64) -> Self {
        Self { datapath_id }
    }

    pub fn datapath_id(&self) -> u64 {
        self.datapath_id
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NODE_PREFIX}{}", self.datapath_id)
    }
}

impl FromStr for DeviceId {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(NODE_PREFIX)
            .and_then(|rest| rest.parse::<u64>().ok())
            .map(Self::new)
            .ok_or_else(|| TranslationError::InvalidConnector(s.to_string()))
    }
}

impl TryFrom<String> for DeviceId {
    type Error = TranslationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatCategory {
    Flow,
    Port,
    Group,
    Meter,
    Table,
    Queue,
}

impl StatCategory {
    pub const ALL: [StatCategory; 6] = [
        Self::Flow,
        Self::Port,
        Self::Group,
        Self::Meter,
        Self::Table,
        Self::Queue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Port => "port",
            Self::Group => "group",
            Self::Meter => "meter",
            Self::Table => "table",
            Self::Queue => "queue",
        }
    }

    /// Multipart body type carrying this category on the wire.
    pub fn multipart_type(&self) -> MultipartType {
        match self {
            Self::Flow => MultipartType::Flow,
            Self::Port => MultipartType::PortStats,
            Self::Group => MultipartType::Group,
            Self::Meter => MultipartType::Meter,
            Self::Table => MultipartType::Table,
            Self::Queue => MultipartType::Queue,
        }
    }

    /// Whether replies of this category can be turned into logical records.
    pub fn is_translated(&self) -> bool {
        matches!(self, Self::Flow | Self::Port | Self::Table)
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown statistics category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for StatCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Unit of cache reconciliation and of write serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceCategoryKey {
    pub device: DeviceId,
    pub category: StatCategory,
}

impl DeviceCategoryKey {
    pub fn new(device: DeviceId, category: StatCategory) -> Self {
        Self { device, category }
    }
}

impl fmt::Display for DeviceCategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match_field", rename_all = "snake_case")]
pub enum MatchEntry {
    InPort {
        connector: String,
    },
    EthDst {
        addr: String,
        mask: Option<String>,
    },
    EthSrc {
        addr: String,
        mask: Option<String>,
    },
    EthType {
        value: u16,
    },
    VlanVid {
        vid: u16,
        mask: Option<u16>,
    },
    IpProto {
        value: u8,
    },
    Ipv4Src {
        addr: Ipv4Addr,
        mask: Option<Ipv4Addr>,
    },
    Ipv4Dst {
        addr: Ipv4Addr,
        mask: Option<Ipv4Addr>,
    },
    TcpSrc {
        port: u16,
    },
    TcpDst {
        port: u16,
    },
    UdpSrc {
        port: u16,
    },
    UdpDst {
        port: u16,
    },
    /// A field without a logical mapping, payload hex encoded
    Opaque {
        class: u16,
        field: u8,
        has_mask: bool,
        payload: String,
    },
}

impl fmt::Display for MatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn masked<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            name: &str,
            value: T,
            mask: Option<T>,
        ) -> fmt::Result {
            match mask {
                Some(mask) => write!(f, "{name}={value}/{mask}"),
                None => write!(f, "{name}={value}"),
            }
        }

        match self {
            Self::InPort { connector } => write!(f, "in_port={connector}"),
            Self::EthDst { addr, mask } => masked(f, "eth_dst", addr, mask.as_ref()),
            Self::EthSrc { addr, mask } => masked(f, "eth_src", addr, mask.as_ref()),
            Self::EthType { value } => write!(f, "eth_type={value:#06x}"),
            Self::VlanVid { vid, mask } => masked(f, "vlan_vid", vid, mask.as_ref()),
            Self::IpProto { value } => write!(f, "ip_proto={value}"),
            Self::Ipv4Src { addr, mask } => masked(f, "ipv4_src", addr, mask.as_ref()),
            Self::Ipv4Dst { addr, mask } => masked(f, "ipv4_dst", addr, mask.as_ref()),
            Self::TcpSrc { port } => write!(f, "tcp_src={port}"),
            Self::TcpDst { port } => write!(f, "tcp_dst={port}"),
            Self::UdpSrc { port } => write!(f, "udp_src={port}"),
            Self::UdpDst { port } => write!(f, "udp_dst={port}"),
            Self::Opaque {
                class,
                field,
                has_mask,
                payload,
            } => write!(f, "oxm[{class:#06x}:{field}:{has_mask}]={payload}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowAction {
    Output { connector: String, max_len: u16 },
    Group { group_id: u32 },
    SetQueue { queue_id: u32 },
    PushVlan { ethertype: u16 },
    PopVlan,
    DecNwTtl,
    Opaque { action_type: u16, payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowInstruction {
    GotoTable { table_id: u8 },
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions { actions: Vec<FlowAction> },
    ApplyActions { actions: Vec<FlowAction> },
    ClearActions,
    Meter { meter_id: u32 },
    Experimenter { experimenter: u32, data: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub table_id: u8,
    pub priority: u16,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: u16,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    #[serde(rename = "match")]
    pub match_: Vec<MatchEntry>,
    pub instructions: Vec<FlowInstruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub connector: String,
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub table_id: u8,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

/// One decoded statistic, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogicalRecord {
    Flow(FlowRecord),
    Port(PortRecord),
    Table(TableRecord),
}

impl LogicalRecord {
    pub fn category(&self) -> StatCategory {
        match self {
            Self::Flow(_) => StatCategory::Flow,
            Self::Port(_) => StatCategory::Port,
            Self::Table(_) => StatCategory::Table,
        }
    }

    /// Stable identity of the record inside its [`DeviceCategoryKey`].
    ///
    /// Flows are identified the way a device identifies them: table, priority,
    /// cookie and match. Match fields are sorted so field order on the wire
    /// does not change the identity.
    pub fn record_key(&self) -> String {
        match self {
            Self::Flow(flow) => {
                let mut fields: Vec<String> = flow.match_.iter().map(ToString::to_string).collect();
                fields.sort();
                format!(
                    "flow/{}/{}/{:#x}/{}",
                    flow.table_id,
                    flow.priority,
                    flow.cookie,
                    fields.join(",")
                )
            }
            Self::Port(port) => format!("port/{}", port.connector),
            Self::Table(table) => format!("table/{}", table.table_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(match_: Vec<MatchEntry>) -> FlowRecord {
        FlowRecord {
            table_id: 0,
            priority: 100,
            cookie: 0xab,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            duration_sec: 1,
            duration_nsec: 0,
            packet_count: 0,
            byte_count: 0,
            match_,
            instructions: vec![],
        }
    }

    #[test]
    fn device_id_parses_node_ids() {
        let device: DeviceId = "openflow:42".parse().unwrap();
        assert_eq!(device.datapath_id(), 42);
        assert_eq!(device.to_string(), "openflow:42");
        assert!("of:42".parse::<DeviceId>().is_err());
        assert!("openflow:x".parse::<DeviceId>().is_err());
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("FLOW".parse::<StatCategory>().unwrap(), StatCategory::Flow);
        assert_eq!("table".parse::<StatCategory>().unwrap(), StatCategory::Table);
        assert!("bogus".parse::<StatCategory>().is_err());
    }

    #[test]
    fn flow_key_ignores_match_field_order() {
        let a = LogicalRecord::Flow(flow(vec![
            MatchEntry::EthType { value: 0x0800 },
            MatchEntry::IpProto { value: 6 },
        ]));
        let b = LogicalRecord::Flow(flow(vec![
            MatchEntry::IpProto { value: 6 },
            MatchEntry::EthType { value: 0x0800 },
        ]));
        assert_eq!(a.record_key(), b.record_key());
        assert_eq!(a.record_key(), "flow/0/100/0xab/eth_type=0x0800,ip_proto=6");
    }

    #[test]
    fn records_serialize_with_kind_tag() {
        let record = LogicalRecord::Table(TableRecord {
            table_id: 2,
            active_count: 5,
            lookup_count: 10,
            matched_count: 8,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "table");
        assert_eq!(json["table_id"], 2);

        let device = serde_json::to_value(DeviceId::new(7)).unwrap();
        assert_eq!(device, "openflow:7");
    }

    #[test]
    fn opaque_match_survives_json() {
        let entry = MatchEntry::Opaque {
            class: 0xffff,
            field: 12,
            has_mask: true,
            payload: "00ff".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["match_field"], "opaque");
        assert_eq!(json["field"], 12);

        let back: MatchEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
