//! # Core Framing Components
//!
//! Low-level frame handling over the ciphered byte stream.
//!
//! This module provides the foundation for the protocol: splitting a TCP
//! stream into frames, applying the per-direction RC4 keystream, and
//! rebuilding wire bytes from outbound frames.
//!
//! ## Components
//! - **Frame**: one type-tagged unit of the wire protocol
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [TotalLength(4, BE)] [Type(1)] [Ciphertext(TotalLength-5)]
//! ```
//!
//! The length covers the whole frame, header included; only the payload is
//! ciphered. Header validation happens before any allocation: lengths below
//! the header size and lengths above [`crate::config::MAX_FRAME_LEN`] are
//! rejected as desync.

pub mod codec;
pub mod frame;

pub use codec::FrameCodec;
pub use frame::Frame;
