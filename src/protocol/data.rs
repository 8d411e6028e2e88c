//! Composite wire types carried inside packet payloads.

use crate::error::Result;
use crate::protocol::wire::{PacketReader, PacketWriter};
use serde::{Deserialize, Serialize};

/// A position in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

impl WorldPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub(crate) fn parse(r: &mut PacketReader<'_>) -> Result<Self> {
        Ok(Self {
            x: r.read_f32()?,
            y: r.read_f32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut PacketWriter) {
        w.write_f32(self.x);
        w.write_f32(self.y);
    }
}

/// One entry in an entity's stat block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatData {
    pub stat_type: u8,
    pub value: i32,
}

impl StatData {
    pub(crate) fn parse(r: &mut PacketReader<'_>) -> Result<Self> {
        Ok(Self {
            stat_type: r.read_u8()?,
            value: r.read_i32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut PacketWriter) {
        w.write_u8(self.stat_type);
        w.write_i32(self.value);
    }
}

/// Mutable per-entity state: id, position, stat block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectStatusData {
    pub object_id: u32,
    pub pos: WorldPos,
    pub stats: Vec<StatData>,
}

impl ObjectStatusData {
    pub(crate) fn parse(r: &mut PacketReader<'_>) -> Result<Self> {
        let object_id = r.read_u32()?;
        let pos = WorldPos::parse(r)?;
        let count = r.read_len()?;
        let mut stats = Vec::with_capacity(count);
        for _ in 0..count {
            stats.push(StatData::parse(r)?);
        }
        Ok(Self {
            object_id,
            pos,
            stats,
        })
    }

    pub(crate) fn write(&self, w: &mut PacketWriter) -> Result<()> {
        w.write_u32(self.object_id);
        self.pos.write(w);
        w.write_len(self.stats.len())?;
        for stat in &self.stats {
            stat.write(w);
        }
        Ok(())
    }
}

/// A full entity as introduced by a world sync: its type plus its status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectStatus {
    pub object_type: u16,
    pub data: ObjectStatusData,
}

impl ObjectStatus {
    /// Shorthand for the entity's id.
    pub fn id(&self) -> u32 {
        self.data.object_id
    }

    pub(crate) fn parse(r: &mut PacketReader<'_>) -> Result<Self> {
        Ok(Self {
            object_type: r.read_u16()?,
            data: ObjectStatusData::parse(r)?,
        })
    }

    pub(crate) fn write(&self, w: &mut PacketWriter) -> Result<()> {
        w.write_u16(self.object_type);
        self.data.write(w)
    }
}

/// One tile of terrain carried by a world sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTile {
    pub x: i16,
    pub y: i16,
    pub tile: u16,
}

impl GroundTile {
    pub(crate) fn parse(r: &mut PacketReader<'_>) -> Result<Self> {
        Ok(Self {
            x: r.read_i16()?,
            y: r.read_i16()?,
            tile: r.read_u16()?,
        })
    }

    pub(crate) fn write(&self, w: &mut PacketWriter) {
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_u16(self.tile);
    }
}
