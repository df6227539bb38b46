//! Instructions, actions and the instruction deserializer registry.
//!
//! Instruction bodies are decoded through a [`DeserializerRegistry`] keyed by
//! protocol version, instruction type and (for vendor extensions) experimenter
//! id. The OpenFlow 1.3 standard instructions are registered by
//! [`DeserializerRegistry::openflow13`]; vendors add their own codes with
//! [`DeserializerRegistry::register`].

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, Result, WireError};
use crate::header::OFP_VERSION_1_3;

pub mod instruction_type {
    pub const GOTO_TABLE: u16 = 1;
    pub const WRITE_METADATA: u16 = 2;
    pub const WRITE_ACTIONS: u16 = 3;
    pub const APPLY_ACTIONS: u16 = 4;
    pub const CLEAR_ACTIONS: u16 = 5;
    pub const METER: u16 = 6;
    pub const EXPERIMENTER: u16 = 0xffff;
}

pub mod action_type {
    pub const OUTPUT: u16 = 0;
    pub const PUSH_VLAN: u16 = 17;
    pub const POP_VLAN: u16 = 18;
    pub const SET_QUEUE: u16 = 21;
    pub const GROUP: u16 = 22;
    pub const DEC_NW_TTL: u16 = 24;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Output { port: u32, max_len: u16 },
    Group { group_id: u32 },
    SetQueue { queue_id: u32 },
    PushVlan { ethertype: u16 },
    PopVlan,
    DecNwTtl,
    Other { action_type: u16, payload: Bytes },
}

impl Action {
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Action::Output { port, max_len } => {
                buf.put_u16(action_type::OUTPUT);
                buf.put_u16(16);
                buf.put_u32(*port);
                buf.put_u16(*max_len);
                buf.put_bytes(0, 6);
            }
            Action::Group { group_id } => put_u32_action(buf, action_type::GROUP, *group_id),
            Action::SetQueue { queue_id } => {
                put_u32_action(buf, action_type::SET_QUEUE, *queue_id)
            }
            Action::PushVlan { ethertype } => {
                buf.put_u16(action_type::PUSH_VLAN);
                buf.put_u16(8);
                buf.put_u16(*ethertype);
                buf.put_bytes(0, 2);
            }
            Action::PopVlan => put_u32_action(buf, action_type::POP_VLAN, 0),
            Action::DecNwTtl => put_u32_action(buf, action_type::DEC_NW_TTL, 0),
            Action::Other {
                action_type,
                payload,
            } => {
                buf.put_u16(*action_type);
                buf.put_u16((4 + payload.len()) as u16);
                buf.put_slice(payload);
            }
        }
    }
}

fn put_u32_action(buf: &mut BytesMut, code: u16, value: u32) {
    buf.put_u16(code);
    buf.put_u16(8);
    buf.put_u32(value);
}

/// Decode a packed action list occupying all of `buf`.
pub fn decode_actions(mut buf: Bytes) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    while buf.has_remaining() {
        need(&buf, 4, "action header")?;
        let code = buf.get_u16();
        let len = buf.get_u16() as usize;
        if len < 4 || len % 8 != 0 {
            return Err(WireError::InvalidLength {
                what: "action",
                length: len,
            });
        }
        need(&buf, len - 4, "action")?;
        let mut body = buf.split_to(len - 4);
        let fixed = |want: usize| -> Result<()> {
            if len != want {
                return Err(WireError::InvalidLength {
                    what: "action",
                    length: len,
                });
            }
            Ok(())
        };
        let action = match code {
            action_type::OUTPUT => {
                fixed(16)?;
                Action::Output {
                    port: body.get_u32(),
                    max_len: body.get_u16(),
                }
            }
            action_type::GROUP => {
                fixed(8)?;
                Action::Group {
                    group_id: body.get_u32(),
                }
            }
            action_type::SET_QUEUE => {
                fixed(8)?;
                Action::SetQueue {
                    queue_id: body.get_u32(),
                }
            }
            action_type::PUSH_VLAN => {
                fixed(8)?;
                Action::PushVlan {
                    ethertype: body.get_u16(),
                }
            }
            action_type::POP_VLAN => {
                fixed(8)?;
                Action::PopVlan
            }
            action_type::DEC_NW_TTL => {
                fixed(8)?;
                Action::DecNwTtl
            }
            other => Action::Other {
                action_type: other,
                payload: body,
            },
        };
        actions.push(action);
    }
    Ok(actions)
}

pub fn encode_actions(actions: &[Action], buf: &mut BytesMut) {
    for action in actions {
        action.encode(buf);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    GotoTable { table_id: u8 },
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter { meter_id: u32 },
    /// A vendor instruction; `data` excludes the experimenter id
    Experimenter { experimenter: u32, data: Bytes },
}

impl Instruction {
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Instruction::GotoTable { table_id } => {
                buf.put_u16(instruction_type::GOTO_TABLE);
                buf.put_u16(8);
                buf.put_u8(*table_id);
                buf.put_bytes(0, 3);
            }
            Instruction::WriteMetadata { metadata, mask } => {
                buf.put_u16(instruction_type::WRITE_METADATA);
                buf.put_u16(24);
                buf.put_bytes(0, 4);
                buf.put_u64(*metadata);
                buf.put_u64(*mask);
            }
            Instruction::WriteActions(actions) | Instruction::ApplyActions(actions) => {
                let code = if matches!(self, Instruction::WriteActions(_)) {
                    instruction_type::WRITE_ACTIONS
                } else {
                    instruction_type::APPLY_ACTIONS
                };
                let mut body = BytesMut::new();
                encode_actions(actions, &mut body);
                buf.put_u16(code);
                buf.put_u16((8 + body.len()) as u16);
                buf.put_bytes(0, 4);
                buf.put_slice(&body);
            }
            Instruction::ClearActions => {
                buf.put_u16(instruction_type::CLEAR_ACTIONS);
                buf.put_u16(8);
                buf.put_bytes(0, 4);
            }
            Instruction::Meter { meter_id } => {
                buf.put_u16(instruction_type::METER);
                buf.put_u16(8);
                buf.put_u32(*meter_id);
            }
            Instruction::Experimenter { experimenter, data } => {
                buf.put_u16(instruction_type::EXPERIMENTER);
                buf.put_u16((8 + data.len()) as u16);
                buf.put_u32(*experimenter);
                buf.put_slice(data);
            }
        }
    }
}

/// Registry lookup key for an instruction deserializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionKey {
    pub version: u8,
    pub type_code: u16,
    /// Set only for `EXPERIMENTER` instructions
    pub experimenter: Option<u32>,
}

impl InstructionKey {
    pub fn standard(version: u8, type_code: u16) -> Self {
        Self {
            version,
            type_code,
            experimenter: None,
        }
    }

    pub fn experimenter(version: u8, experimenter: u32) -> Self {
        Self {
            version,
            type_code: instruction_type::EXPERIMENTER,
            experimenter: Some(experimenter),
        }
    }
}

/// Decodes the instruction body that follows the 4-byte type/length header.
///
/// For experimenter instructions the body still starts with the experimenter id.
pub type InstructionDeserializer = fn(Bytes) -> Result<Instruction>;

#[derive(Debug, Clone)]
pub struct DeserializerRegistry {
    instructions: HashMap<InstructionKey, InstructionDeserializer>,
}

impl Default for DeserializerRegistry {
    fn default() -> Self {
        Self::openflow13()
    }
}

impl DeserializerRegistry {
    pub fn empty() -> Self {
        Self {
            instructions: HashMap::new(),
        }
    }

    /// Registry carrying every standard OpenFlow 1.3 instruction.
    pub fn openflow13() -> Self {
        let mut registry = Self::empty();
        let v = OFP_VERSION_1_3;
        registry.register(
            InstructionKey::standard(v, instruction_type::GOTO_TABLE),
            decode_goto_table,
        );
        registry.register(
            InstructionKey::standard(v, instruction_type::WRITE_METADATA),
            decode_write_metadata,
        );
        registry.register(
            InstructionKey::standard(v, instruction_type::WRITE_ACTIONS),
            decode_write_actions,
        );
        registry.register(
            InstructionKey::standard(v, instruction_type::APPLY_ACTIONS),
            decode_apply_actions,
        );
        registry.register(
            InstructionKey::standard(v, instruction_type::CLEAR_ACTIONS),
            decode_clear_actions,
        );
        registry.register(
            InstructionKey::standard(v, instruction_type::METER),
            decode_meter,
        );
        registry
    }

    /// Register a deserializer, returning the one it replaced.
    pub fn register(
        &mut self,
        key: InstructionKey,
        deserializer: InstructionDeserializer,
    ) -> Option<InstructionDeserializer> {
        self.instructions.insert(key, deserializer)
    }

    pub fn get(&self, key: &InstructionKey) -> Option<InstructionDeserializer> {
        self.instructions.get(key).copied()
    }

    /// Decode a packed instruction list occupying all of `buf`.
    pub fn decode_instructions(&self, version: u8, mut buf: Bytes) -> Result<Vec<Instruction>> {
        let mut out = Vec::new();
        while buf.has_remaining() {
            need(&buf, 4, "instruction header")?;
            let type_code = buf.get_u16();
            let len = buf.get_u16() as usize;
            if len < 4 {
                return Err(WireError::InvalidLength {
                    what: "instruction",
                    length: len,
                });
            }
            need(&buf, len - 4, "instruction")?;
            let body = buf.split_to(len - 4);

            let experimenter = if type_code == instruction_type::EXPERIMENTER {
                need(&body, 4, "experimenter id")?;
                Some(u32::from_be_bytes([body[0], body[1], body[2], body[3]]))
            } else {
                None
            };
            let key = InstructionKey {
                version,
                type_code,
                experimenter,
            };
            let deserializer = self.get(&key).ok_or(WireError::UnregisteredInstruction {
                version,
                type_code,
                experimenter,
            })?;
            out.push(deserializer(body)?);
        }
        Ok(out)
    }
}

fn exact(body: &Bytes, want: usize) -> Result<()> {
    if body.len() != want {
        return Err(WireError::InvalidLength {
            what: "instruction",
            length: body.len() + 4,
        });
    }
    Ok(())
}

fn decode_goto_table(mut body: Bytes) -> Result<Instruction> {
    exact(&body, 4)?;
    Ok(Instruction::GotoTable {
        table_id: body.get_u8(),
    })
}

fn decode_write_metadata(mut body: Bytes) -> Result<Instruction> {
    exact(&body, 20)?;
    body.advance(4);
    Ok(Instruction::WriteMetadata {
        metadata: body.get_u64(),
        mask: body.get_u64(),
    })
}

fn decode_write_actions(mut body: Bytes) -> Result<Instruction> {
    need(&body, 4, "instruction")?;
    body.advance(4);
    Ok(Instruction::WriteActions(decode_actions(body)?))
}

fn decode_apply_actions(mut body: Bytes) -> Result<Instruction> {
    need(&body, 4, "instruction")?;
    body.advance(4);
    Ok(Instruction::ApplyActions(decode_actions(body)?))
}

fn decode_clear_actions(body: Bytes) -> Result<Instruction> {
    exact(&body, 4)?;
    Ok(Instruction::ClearActions)
}

fn decode_meter(mut body: Bytes) -> Result<Instruction> {
    exact(&body, 4)?;
    Ok(Instruction::Meter {
        meter_id: body.get_u32(),
    })
}
