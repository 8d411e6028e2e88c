//! # Protocol Layer
//!
//! Packet definitions and payload codecs above the frame layer.
//!
//! ## Components
//! - **Wire**: checked big-endian read/write cursors
//! - **Data**: composite types carried inside payloads
//! - **Message**: the closed [`Packet`] catalogue and its tag mapping
//!
//! Everything here is deterministic and stateless; session state lives in
//! [`crate::service`].

pub mod data;
pub mod message;
pub mod wire;


pub use data::{GroundTile, ObjectStatus, ObjectStatusData, StatData, WorldPos};
pub use message::Packet;
