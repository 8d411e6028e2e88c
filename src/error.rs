//! # Error Types
//!
//! Error handling for the client engine.
//!
//! This module defines all error variants that can occur during a session,
//! from low-level I/O failures to protocol desync and caller misuse.
//!
//! ## Error Categories
//! - **Transport**: connect/read/write failures; always fatal to the session
//! - **Framing**: invalid, oversized, or truncated frames
//! - **Parsing**: unknown type tags and malformed payloads
//! - **Caller misuse**: operations issued in the wrong session phase
//!
//! Framing and parsing failures end the session rather than skipping the
//! packet: once a frame is misread, the cipher keystream is misaligned and
//! every subsequent byte decrypts to garbage.
//!
//! ## Example Usage
//! ```rust
//! use realmgate::error::{ProtocolError, Result};
//!
//! fn check_tag(tag: u8) -> Result<()> {
//!     match tag {
//!         0x08 => Ok(()),
//!         other => Err(ProtocolError::UnknownType(other)),
//!     }
//! }
//!
//! assert!(check_tag(0x08).is_ok());
//! assert!(check_tag(0xFF).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Lock poisoning errors
    pub const ERR_PHASE_LOCK: &str = "Failed to acquire session phase lock";
    pub const ERR_RUNTIME_LOCK: &str = "Failed to acquire session runtime lock";
}

// ProtocolError is the primary error type for all client operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Truncated frame: stream ended mid-frame")]
    TruncatedFrame,

    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownType(u8),

    #[error("Malformed payload: {0}")]
    MalformedPayload(&'static str),

    /// A send or disconnect was issued with no live connection.
    #[error("Not connected")]
    NotConnected,

    /// `connect` was called on a session past the idle phase. Sessions are
    /// single-use; a finished session rejects reconnection the same way.
    #[error("Session already started")]
    AlreadyConnected,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
