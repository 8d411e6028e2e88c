//! # Realmgate
//!
//! Stateful client engine for a length-prefixed, stream-ciphered binary
//! game protocol.
//!
//! The crate owns everything below the application: framing and cipher
//! state, packet parsing, the connection state machine, automatic
//! protocol compliance (keepalive echo, movement acks, world-sync acks),
//! and a client-side registry of server-owned entities. Applications
//! observe the session through listener traits and inject traffic
//! through the send paths.
//!
//! ## Layers
//! - [`core`]: frame codec; length-prefixed frames over two RC4 keystreams
//! - [`protocol`]: packet enum, composite data types, payload readers/writers
//! - [`service`]: the client engine, listeners, registry, automatic handler
//! - [`config`]: wire constants, default keys, client configuration
//! - [`utils`]: keystream state and per-session metrics
//!
//! ## Wire Format
//! ```text
//! [Total Length (4 bytes, BE)] [Type (1 byte)] [Ciphertext (Total Length - 5)]
//! ```
//!
//! Each direction of a session runs its own keystream, advanced by every
//! frame and never reset, so a session is single-use by construction.
//!
//! ## Quick Start
//! ```no_run
//! use realmgate::{Client, Packet};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! #[tokio::main]
//! async fn main() -> realmgate::Result<()> {
//!     let client = Client::new();
//!     client.connect(IpAddr::V4(Ipv4Addr::LOCALHOST))?;
//!
//!     // Register listeners before connecting in real code; queued sends
//!     // become valid once the connected notification fires.
//!     client.send_async(Packet::Ping { serial: 1 })?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

// Re-export the primary API surface at the crate root
pub use config::ClientConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{GroundTile, ObjectStatus, ObjectStatusData, Packet, StatData, WorldPos};
pub use service::{
    Client, ConnectionListener, ConnectionPhase, DataListener, ObjectRegistry, PacketListener,
};
pub use utils::{MetricsSnapshot, SessionKeys};
