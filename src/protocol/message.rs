//! # Packet Catalogue
//!
//! The closed set of packet variants the engine understands, plus the
//! tag-to-codec mapping between them and raw frames.
//!
//! Dispatch is exhaustive matching on the enum: adding a variant forces
//! every handling site through the compiler, so there is no reflective
//! type inspection anywhere. Parsing and serialization are inverses for
//! every variant (`parse(tag(p), to_payload(p)) == p`).

use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::data::{GroundTile, ObjectStatus, ObjectStatusData, WorldPos};
use crate::protocol::wire::{PacketReader, PacketWriter};
use serde::{Deserialize, Serialize};

/// Wire type tags, one per packet variant.
pub mod tags {
    pub const FAILURE: u8 = 0x00;
    pub const PING: u8 = 0x08;
    pub const PONG: u8 = 0x09;
    pub const UPDATE: u8 = 0x14;
    pub const UPDATE_ACK: u8 = 0x15;
    pub const NEW_TICK: u8 = 0x1E;
    pub const GOTO: u8 = 0x28;
    pub const GOTO_ACK: u8 = 0x29;
    pub const CREATE_SUCCESS: u8 = 0x32;
}

/// One protocol packet, parsed into its variant-specific fields.
///
/// Values are immutable once parsed off the wire; outbound packets are
/// constructed fresh for every send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Terminal server-side error; ends the session from the read side.
    Failure { error_id: u32, description: String },
    /// Keepalive request from the server.
    Ping { serial: u32 },
    /// Keepalive reply echoing the request serial plus elapsed session time.
    Pong { serial: u32, time: u32 },
    /// World sync: terrain, newly visible entities, dropped entity ids.
    Update {
        tiles: Vec<GroundTile>,
        newobjs: Vec<ObjectStatus>,
        drops: Vec<u32>,
    },
    /// Acknowledges one world sync; carries nothing.
    UpdateAck,
    /// Server time step carrying authoritative entity positions.
    NewTick {
        tick_id: u32,
        tick_time: u32,
        statuses: Vec<ObjectStatusData>,
    },
    /// Server-directed move of a single entity.
    Goto { object_id: u32, pos: WorldPos },
    /// Acknowledges a [`Packet::Goto`] with the session's elapsed time.
    GotoAck { time: u32 },
    /// Grants the player entity id after character creation.
    CreateSuccess { object_id: u32, char_id: u32 },
}

impl Packet {
    /// The wire tag for this variant.
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Failure { .. } => tags::FAILURE,
            Packet::Ping { .. } => tags::PING,
            Packet::Pong { .. } => tags::PONG,
            Packet::Update { .. } => tags::UPDATE,
            Packet::UpdateAck => tags::UPDATE_ACK,
            Packet::NewTick { .. } => tags::NEW_TICK,
            Packet::Goto { .. } => tags::GOTO,
            Packet::GotoAck { .. } => tags::GOTO_ACK,
            Packet::CreateSuccess { .. } => tags::CREATE_SUCCESS,
        }
    }

    /// Human-readable variant name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Failure { .. } => "Failure",
            Packet::Ping { .. } => "Ping",
            Packet::Pong { .. } => "Pong",
            Packet::Update { .. } => "Update",
            Packet::UpdateAck => "UpdateAck",
            Packet::NewTick { .. } => "NewTick",
            Packet::Goto { .. } => "Goto",
            Packet::GotoAck { .. } => "GotoAck",
            Packet::CreateSuccess { .. } => "CreateSuccess",
        }
    }

    /// Whether receiving this packet ends the session from the read side.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Packet::Failure { .. })
    }

    /// Parse a packet of the given type from its plaintext payload.
    pub fn parse(tag: u8, payload: &[u8]) -> Result<Self> {
        let mut r = PacketReader::new(payload);
        let packet = match tag {
            tags::FAILURE => Packet::Failure {
                error_id: r.read_u32()?,
                description: r.read_string()?,
            },
            tags::PING => Packet::Ping {
                serial: r.read_u32()?,
            },
            tags::PONG => Packet::Pong {
                serial: r.read_u32()?,
                time: r.read_u32()?,
            },
            tags::UPDATE => {
                let tile_count = r.read_len()?;
                let mut tiles = Vec::with_capacity(tile_count);
                for _ in 0..tile_count {
                    tiles.push(GroundTile::parse(&mut r)?);
                }
                let obj_count = r.read_len()?;
                let mut newobjs = Vec::with_capacity(obj_count);
                for _ in 0..obj_count {
                    newobjs.push(ObjectStatus::parse(&mut r)?);
                }
                let drop_count = r.read_len()?;
                let mut drops = Vec::with_capacity(drop_count);
                for _ in 0..drop_count {
                    drops.push(r.read_u32()?);
                }
                Packet::Update {
                    tiles,
                    newobjs,
                    drops,
                }
            }
            tags::UPDATE_ACK => Packet::UpdateAck,
            tags::NEW_TICK => {
                let tick_id = r.read_u32()?;
                let tick_time = r.read_u32()?;
                let count = r.read_len()?;
                let mut statuses = Vec::with_capacity(count);
                for _ in 0..count {
                    statuses.push(ObjectStatusData::parse(&mut r)?);
                }
                Packet::NewTick {
                    tick_id,
                    tick_time,
                    statuses,
                }
            }
            tags::GOTO => Packet::Goto {
                object_id: r.read_u32()?,
                pos: WorldPos::parse(&mut r)?,
            },
            tags::GOTO_ACK => Packet::GotoAck {
                time: r.read_u32()?,
            },
            tags::CREATE_SUCCESS => Packet::CreateSuccess {
                object_id: r.read_u32()?,
                char_id: r.read_u32()?,
            },
            other => return Err(ProtocolError::UnknownType(other)),
        };
        Ok(packet)
    }

    /// Serialize this packet's fields into a plaintext payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let mut w = PacketWriter::new();
        match self {
            Packet::Failure {
                error_id,
                description,
            } => {
                w.write_u32(*error_id);
                w.write_string(description)?;
            }
            Packet::Ping { serial } => w.write_u32(*serial),
            Packet::Pong { serial, time } => {
                w.write_u32(*serial);
                w.write_u32(*time);
            }
            Packet::Update {
                tiles,
                newobjs,
                drops,
            } => {
                w.write_len(tiles.len())?;
                for tile in tiles {
                    tile.write(&mut w);
                }
                w.write_len(newobjs.len())?;
                for obj in newobjs {
                    obj.write(&mut w)?;
                }
                w.write_len(drops.len())?;
                for id in drops {
                    w.write_u32(*id);
                }
            }
            Packet::UpdateAck => {}
            Packet::NewTick {
                tick_id,
                tick_time,
                statuses,
            } => {
                w.write_u32(*tick_id);
                w.write_u32(*tick_time);
                w.write_len(statuses.len())?;
                for status in statuses {
                    status.write(&mut w)?;
                }
            }
            Packet::Goto { object_id, pos } => {
                w.write_u32(*object_id);
                pos.write(&mut w);
            }
            Packet::GotoAck { time } => w.write_u32(*time),
            Packet::CreateSuccess { object_id, char_id } => {
                w.write_u32(*object_id);
                w.write_u32(*char_id);
            }
        }
        Ok(w.into_vec())
    }

    /// Serialize into a ready-to-encode frame. Every outbound path, sync
    /// or queued, goes through here.
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::new(self.tag(), self.to_payload()?))
    }
}
