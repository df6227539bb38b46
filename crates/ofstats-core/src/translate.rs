//! Wire statistics fragments to logical records.

use std::ops::AddAssign;
use std::sync::Arc;

use bytes::Bytes;
use ofstats_wire::{
    frame_fixed_entries, frame_flow_entries, stats, Action, DeserializerRegistry, EntryFrames,
    FlowStatsEntry, Instruction, OxmField, PortStatsEntry, TableStatsEntry, WireError,
    OFP_VERSION_1_3,
};
use serde::{Deserialize, Serialize};

use crate::error::TranslationError;
use crate::model::{
    DeviceId, FlowAction, FlowInstruction, FlowRecord, LogicalRecord, MatchEntry, PortRecord,
    StatCategory, TableRecord,
};
use crate::ports::connector_id;

/// Records dropped while translating, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecords {
    pub malformed: usize,
    pub unresolved_ports: usize,
}

impl SkippedRecords {
    pub fn total(&self) -> usize {
        self.malformed + self.unresolved_ports
    }

    pub fn has_skipped(&self) -> bool {
        self.total() > 0
    }
}

impl AddAssign for SkippedRecords {
    fn add_assign(&mut self, other: Self) {
        self.malformed += other.malformed;
        self.unresolved_ports += other.unresolved_ports;
    }
}

/// Output of translating one fragment body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    pub records: Vec<LogicalRecord>,
    pub skipped: SkippedRecords,
}

impl Translation {
    fn skip(&mut self, error: &TranslationError) {
        match error {
            TranslationError::UnresolvedPort { .. } => self.skipped.unresolved_ports += 1,
            _ => self.skipped.malformed += 1,
        }
    }
}

/// Translator for one statistics category.
///
/// Translation is a pure function of the body and the device: the same input
/// always yields the same records and skip counts.
#[derive(Debug, Clone)]
pub struct FragmentTranslator {
    category: StatCategory,
    version: u8,
    registry: Arc<DeserializerRegistry>,
}

impl FragmentTranslator {
    pub fn new(category: StatCategory) -> Self {
        Self::with_registry(category, Arc::new(DeserializerRegistry::openflow13()))
    }

    pub fn with_registry(category: StatCategory, registry: Arc<DeserializerRegistry>) -> Self {
        Self {
            category,
            version: OFP_VERSION_1_3,
            registry,
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn category(&self) -> StatCategory {
        self.category
    }

    pub fn translate(&self, body: &Bytes, device: &DeviceId) -> Result<Translation, TranslationError> {
        let dpid = device.datapath_id();
        match self.category {
            StatCategory::Flow => self.translate_frames(frame_flow_entries(body), body, |frame| {
                let entry = FlowStatsEntry::decode(frame, self.version, &self.registry)
                    .map_err(|source| self.malformed(source))?;
                flow_record(&entry, dpid).map(LogicalRecord::Flow)
            }),
            StatCategory::Port => {
                let frames = frame_fixed_entries(body, stats::PORT_STATS_LEN);
                self.translate_frames(frames, body, |frame| {
                    let entry = PortStatsEntry::decode(frame).map_err(|source| self.malformed(source))?;
                    port_record(&entry, dpid).map(LogicalRecord::Port)
                })
            }
            StatCategory::Table => {
                let frames = frame_fixed_entries(body, stats::TABLE_STATS_LEN);
                self.translate_frames(frames, body, |frame| {
                    let entry =
                        TableStatsEntry::decode(frame).map_err(|source| self.malformed(source))?;
                    Ok(LogicalRecord::Table(table_record(&entry)))
                })
            }
            other => Err(TranslationError::UnsupportedCategory(other)),
        }
    }

    fn malformed(&self, source: WireError) -> TranslationError {
        TranslationError::Malformed {
            category: self.category,
            source,
        }
    }

    fn translate_frames<F>(
        &self,
        framed: EntryFrames,
        body: &Bytes,
        mut convert: F,
    ) -> Result<Translation, TranslationError>
    where
        F: FnMut(Bytes) -> Result<LogicalRecord, TranslationError>,
    {
        let EntryFrames { frames, trailing } = framed;
        if frames.is_empty() {
            if let Some(source) = trailing {
                return Err(TranslationError::UnparseableBody {
                    category: self.category,
                    len: body.len(),
                    source,
                });
            }
            return Ok(Translation::default());
        }

        let mut translation = Translation::default();
        for frame in frames {
            match convert(frame) {
                Ok(record) => translation.records.push(record),
                Err(error) => {
                    tracing::debug!(category = %self.category, error = %error, "Skipping record");
                    translation.skip(&error);
                }
            }
        }
        if let Some(source) = trailing {
            tracing::debug!(category = %self.category, error = %source, "Skipping trailing bytes");
            translation.skipped.malformed += 1;
        }
        Ok(translation)
    }
}

fn flow_record(entry: &FlowStatsEntry, dpid: u64) -> Result<FlowRecord, TranslationError> {
    let match_ = entry
        .match_
        .fields
        .iter()
        .map(|field| match_entry(field, dpid))
        .collect::<Result<Vec<_>, _>>()?;
    let instructions = entry
        .instructions
        .iter()
        .map(|instruction| flow_instruction(instruction, dpid))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FlowRecord {
        table_id: entry.table_id,
        priority: entry.priority,
        cookie: entry.cookie,
        idle_timeout: entry.idle_timeout,
        hard_timeout: entry.hard_timeout,
        flags: entry.flags,
        duration_sec: entry.duration_sec,
        duration_nsec: entry.duration_nsec,
        packet_count: entry.packet_count,
        byte_count: entry.byte_count,
        match_,
        instructions,
    })
}

fn mac(addr: &[u8; 6]) -> String {
    addr.iter()
        .map(|octet| format!("{octet:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn match_entry(field: &OxmField, dpid: u64) -> Result<MatchEntry, TranslationError> {
    let entry = match field {
        OxmField::InPort(port) => MatchEntry::InPort {
            connector: connector_id(dpid, *port)?,
        },
        OxmField::EthDst { addr, mask } => MatchEntry::EthDst {
            addr: mac(addr),
            mask: mask.as_ref().map(mac),
        },
        OxmField::EthSrc { addr, mask } => MatchEntry::EthSrc {
            addr: mac(addr),
            mask: mask.as_ref().map(mac),
        },
        OxmField::EthType(value) => MatchEntry::EthType { value: *value },
        OxmField::VlanVid { vid, mask } => MatchEntry::VlanVid {
            vid: *vid,
            mask: *mask,
        },
        OxmField::IpProto(value) => MatchEntry::IpProto { value: *value },
        OxmField::Ipv4Src { addr, mask } => MatchEntry::Ipv4Src {
            addr: *addr,
            mask: *mask,
        },
        OxmField::Ipv4Dst { addr, mask } => MatchEntry::Ipv4Dst {
            addr: *addr,
            mask: *mask,
        },
        OxmField::TcpSrc(port) => MatchEntry::TcpSrc { port: *port },
        OxmField::TcpDst(port) => MatchEntry::TcpDst { port: *port },
        OxmField::UdpSrc(port) => MatchEntry::UdpSrc { port: *port },
        OxmField::UdpDst(port) => MatchEntry::UdpDst { port: *port },
        OxmField::Unknown {
            class,
            field,
            has_mask,
            payload,
        } => MatchEntry::Opaque {
            class: *class,
            field: *field,
            has_mask: *has_mask,
            payload: hex::encode(payload),
        },
    };
    Ok(entry)
}

fn flow_actions(actions: &[Action], dpid: u64) -> Result<Vec<FlowAction>, TranslationError> {
    actions
        .iter()
        .map(|action| {
            Ok(match action {
                Action::Output { port, max_len } => FlowAction::Output {
                    connector: connector_id(dpid, *port)?,
                    max_len: *max_len,
                },
                Action::Group { group_id } => FlowAction::Group {
                    group_id: *group_id,
                },
                Action::SetQueue { queue_id } => FlowAction::SetQueue {
                    queue_id: *queue_id,
                },
                Action::PushVlan { ethertype } => FlowAction::PushVlan {
                    ethertype: *ethertype,
                },
                Action::PopVlan => FlowAction::PopVlan,
                Action::DecNwTtl => FlowAction::DecNwTtl,
                Action::Other {
                    action_type,
                    payload,
                } => FlowAction::Opaque {
                    action_type: *action_type,
                    payload: hex::encode(payload),
                },
            })
        })
        .collect()
}

fn flow_instruction(
    instruction: &Instruction,
    dpid: u64,
) -> Result<FlowInstruction, TranslationError> {
    let translated = match instruction {
        Instruction::GotoTable { table_id } => FlowInstruction::GotoTable {
            table_id: *table_id,
        },
        Instruction::WriteMetadata { metadata, mask } => FlowInstruction::WriteMetadata {
            metadata: *metadata,
            mask: *mask,
        },
        Instruction::WriteActions(actions) => FlowInstruction::WriteActions {
            actions: flow_actions(actions, dpid)?,
        },
        Instruction::ApplyActions(actions) => FlowInstruction::ApplyActions {
            actions: flow_actions(actions, dpid)?,
        },
        Instruction::ClearActions => FlowInstruction::ClearActions,
        Instruction::Meter { meter_id } => FlowInstruction::Meter {
            meter_id: *meter_id,
        },
        Instruction::Experimenter { experimenter, data } => FlowInstruction::Experimenter {
            experimenter: *experimenter,
            data: hex::encode(data),
        },
    };
    Ok(translated)
}

fn port_record(entry: &PortStatsEntry, dpid: u64) -> Result<PortRecord, TranslationError> {
    Ok(PortRecord {
        connector: connector_id(dpid, entry.port_no)?,
        port_no: entry.port_no,
        rx_packets: entry.rx_packets,
        tx_packets: entry.tx_packets,
        rx_bytes: entry.rx_bytes,
        tx_bytes: entry.tx_bytes,
        rx_dropped: entry.rx_dropped,
        tx_dropped: entry.tx_dropped,
        rx_errors: entry.rx_errors,
        tx_errors: entry.tx_errors,
        rx_frame_err: entry.rx_frame_err,
        rx_over_err: entry.rx_over_err,
        rx_crc_err: entry.rx_crc_err,
        collisions: entry.collisions,
        duration_sec: entry.duration_sec,
        duration_nsec: entry.duration_nsec,
    })
}

fn table_record(entry: &TableStatsEntry) -> TableRecord {
    TableRecord {
        table_id: entry.table_id,
        active_count: entry.active_count,
        lookup_count: entry.lookup_count,
        matched_count: entry.matched_count,
    }
}
