//! # Utility Modules
//!
//! Supporting utilities for cryptography and observability.
//!
//! ## Components
//! - **Crypto**: RC4 keystreams and per-session key pairs
//! - **Metrics**: Thread-safe per-session counters
//!
//! The cipher here is a positional stream cipher: both ends of the
//! connection advance their keystreams byte-for-byte with the traffic, so
//! the utilities never expose a way to rewind or reseed a live stream.

pub mod crypto;
pub mod metrics;

// Re-export public types for advanced users
pub use crypto::{Keystream, SessionKeys};
pub use metrics::{Metrics, MetricsSnapshot};
