//! # Client Service
//!
//! The session-level machinery built on top of the frame codec and the
//! packet layer.
//!
//! ## Components
//! - **Client**: connection lifecycle, send paths, and the query surface
//! - **Handler**: automatic protocol compliance (keepalive, acks, world sync)
//! - **Listener**: observer traits for packets, lifecycle, and entity changes
//! - **Registry**: the client-side view of server-owned entities
//! - **Session**: connection phases and per-session runtime state

pub mod client;
pub(crate) mod handler;
pub mod listener;
pub mod registry;
pub mod session;

// Re-export public types for advanced users
pub use client::Client;
pub use listener::{ConnectionListener, DataListener, PacketListener};
pub use registry::ObjectRegistry;
pub use session::ConnectionPhase;
