//! RC4 keystreams for frame payload encryption.
//!
//! The wire protocol ciphers every payload byte with one of two RC4
//! streams: one seeded for client-to-server traffic, one for
//! server-to-client. Each stream is advanced by exactly the bytes it has
//! processed and is never reset for the lifetime of a session; resetting
//! (or reusing a stream across sessions) desynchronizes the peer and turns
//! every later frame into garbage.

use crate::config::{CLIENT_KEY, KEY_LEN, SERVER_KEY};
use rc4::consts::U13;
use rc4::{Key, KeyInit, Rc4, StreamCipher};
use std::fmt;

/// One direction's cipher stream.
///
/// RC4 encryption and decryption are the same XOR, so a single `apply`
/// serves both; what matters is which seed the stream started from and
/// how many bytes it has already consumed.
pub struct Keystream {
    cipher: Rc4<U13>,
}

impl Keystream {
    /// Seed a fresh keystream from a 13-byte key.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Rc4::new(Key::<U13>::from_slice(key)),
        }
    }

    /// XOR the buffer with the next `buf.len()` keystream bytes, in place.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }
}

impl fmt::Debug for Keystream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Cipher state stays opaque
        f.debug_struct("Keystream").finish_non_exhaustive()
    }
}

/// The per-session key pair, one seed per traffic direction.
///
/// Injected at client construction so tests can run synthetic keys; the
/// default is the protocol's well-known constant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKeys {
    /// Seed for client-to-server traffic
    pub outbound: [u8; KEY_LEN],
    /// Seed for server-to-client traffic
    pub inbound: [u8; KEY_LEN],
}

impl SessionKeys {
    /// Build a key pair from explicit seeds.
    pub fn new(outbound: [u8; KEY_LEN], inbound: [u8; KEY_LEN]) -> Self {
        Self { outbound, inbound }
    }

    /// Fresh keystream for bytes this client sends.
    pub fn outbound_stream(&self) -> Keystream {
        Keystream::new(&self.outbound)
    }

    /// Fresh keystream for bytes this client receives.
    pub fn inbound_stream(&self) -> Keystream {
        Keystream::new(&self.inbound)
    }
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self {
            outbound: CLIENT_KEY,
            inbound: SERVER_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_symmetric() {
        let key = [7u8; KEY_LEN];
        let mut enc = Keystream::new(&key);
        let mut dec = Keystream::new(&key);

        let plain = b"hello world".to_vec();
        let mut buf = plain.clone();
        enc.apply(&mut buf);
        assert_ne!(buf, plain);
        dec.apply(&mut buf);
        assert_eq!(buf, plain);
    }

    #[test]
    fn stream_position_survives_chunking() {
        let key = [0x42u8; KEY_LEN];
        let mut whole = Keystream::new(&key);
        let mut chunked = Keystream::new(&key);

        let mut buf_whole = vec![0u8; 64];
        whole.apply(&mut buf_whole);

        let mut buf_chunked = vec![0u8; 64];
        for chunk in buf_chunked.chunks_mut(7) {
            chunked.apply(chunk);
        }

        assert_eq!(buf_whole, buf_chunked);
    }

    #[test]
    fn different_keys_produce_different_streams() {
        let mut a = Keystream::new(&[1u8; KEY_LEN]);
        let mut b = Keystream::new(&[2u8; KEY_LEN]);

        let mut buf_a = vec![0u8; 32];
        let mut buf_b = vec![0u8; 32];
        a.apply(&mut buf_a);
        b.apply(&mut buf_b);

        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn default_keys_are_directional() {
        let keys = SessionKeys::default();
        assert_ne!(keys.outbound, keys.inbound);
        assert_eq!(keys.outbound, CLIENT_KEY);
        assert_eq!(keys.inbound, SERVER_KEY);
    }
}
