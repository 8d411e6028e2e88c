//! Tokio codec translating between wire bytes and [`Frame`]s.
//!
//! One codec instance owns one [`Keystream`] and therefore serves exactly
//! one traffic direction. A session uses two instances: the read half
//! decodes with the inbound stream, the write half encodes with the
//! outbound stream. Because the keystream position is part of the codec
//! state, a codec must never be recreated mid-session.

use crate::config::{FRAME_HEADER_LEN, MAX_FRAME_LEN};
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::Keystream;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Stream codec for length-prefixed, type-tagged, ciphered frames.
pub struct FrameCodec {
    cipher: Keystream,
}

impl FrameCodec {
    /// Build a codec around the keystream for this direction.
    pub fn new(cipher: Keystream) -> Self {
        Self { cipher }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < 4 {
            return Ok(None);
        }

        // Peek the length without consuming it; the frame may still be partial.
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&src[..4]);
        let total = u32::from_be_bytes(len_bytes) as usize;

        if total < FRAME_HEADER_LEN {
            return Err(ProtocolError::InvalidHeader);
        }
        if total > MAX_FRAME_LEN {
            return Err(ProtocolError::OversizedFrame(total));
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(4);
        let tag = src.get_u8();
        let mut payload = src.split_to(total - FRAME_HEADER_LEN).to_vec();
        self.cipher.apply(&mut payload);

        trace!(tag = format_args!("0x{tag:02X}"), len = total, "decoded frame");
        Ok(Some(Frame { tag, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            // Stream ended with a partial frame buffered
            None => Err(ProtocolError::TruncatedFrame),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let total = frame.payload.len() + FRAME_HEADER_LEN;
        if total > MAX_FRAME_LEN {
            return Err(ProtocolError::OversizedFrame(total));
        }

        let mut payload = frame.payload;
        self.cipher.apply(&mut payload);

        dst.reserve(total);
        dst.put_u32(total as u32);
        dst.put_u8(frame.tag);
        dst.put_slice(&payload);

        trace!(tag = format_args!("0x{:02X}", frame.tag), len = total, "encoded frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KEY_LEN;

    fn codec_pair() -> (FrameCodec, FrameCodec) {
        let key = [0x5Au8; KEY_LEN];
        (
            FrameCodec::new(Keystream::new(&key)),
            FrameCodec::new(Keystream::new(&key)),
        )
    }

    #[test]
    fn encode_decode_roundtrip() {
        let (mut enc, mut dec) = codec_pair();
        let frame = Frame::new(0x14, vec![9, 8, 7, 6, 5]);

        let mut wire = BytesMut::new();
        enc.encode(frame.clone(), &mut wire).unwrap();
        assert_eq!(wire.len(), frame.wire_len());

        let out = dec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(out, frame);
        assert!(wire.is_empty());
    }

    #[test]
    fn zero_length_payload_roundtrip() {
        let (mut enc, mut dec) = codec_pair();
        let frame = Frame::new(0x15, Vec::new());

        let mut wire = BytesMut::new();
        enc.encode(frame.clone(), &mut wire).unwrap();
        assert_eq!(wire.len(), FRAME_HEADER_LEN);

        let out = dec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let (mut enc, mut dec) = codec_pair();
        let frame = Frame::new(0x28, vec![1; 32]);

        let mut wire = BytesMut::new();
        enc.encode(frame.clone(), &mut wire).unwrap();

        let mut partial = BytesMut::from(&wire[..10]);
        assert!(dec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&wire[10..]);
        let out = dec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let (mut enc, _) = codec_pair();
        let payload = vec![0xAB; 16];

        let mut wire = BytesMut::new();
        enc.encode(Frame::new(0x1E, payload.clone()), &mut wire).unwrap();

        assert_ne!(&wire[FRAME_HEADER_LEN..], payload.as_slice());
    }

    #[test]
    fn undersized_length_is_invalid_header() {
        let (_, mut dec) = codec_pair();
        let mut wire = BytesMut::from(&4u32.to_be_bytes()[..]);
        wire.put_u8(0x08);

        assert!(matches!(
            dec.decode(&mut wire),
            Err(ProtocolError::InvalidHeader)
        ));
    }

    #[test]
    fn oversized_length_is_rejected_before_buffering() {
        let (_, mut dec) = codec_pair();
        let mut wire = BytesMut::new();
        wire.put_u32((MAX_FRAME_LEN + 1) as u32);
        wire.put_u8(0x08);

        assert!(matches!(
            dec.decode(&mut wire),
            Err(ProtocolError::OversizedFrame(_))
        ));
    }

    #[test]
    fn eof_mid_frame_is_truncation() {
        let (mut enc, mut dec) = codec_pair();
        let mut wire = BytesMut::new();
        enc.encode(Frame::new(0x00, vec![1, 2, 3, 4]), &mut wire).unwrap();

        let mut cut = BytesMut::from(&wire[..wire.len() - 2]);
        assert!(matches!(
            dec.decode_eof(&mut cut),
            Err(ProtocolError::TruncatedFrame)
        ));
    }

    #[test]
    fn eof_on_clean_boundary_is_none() {
        let (_, mut dec) = codec_pair();
        let mut empty = BytesMut::new();
        assert!(dec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn keystream_continues_across_frames() {
        let (mut enc, mut dec) = codec_pair();

        let frames: Vec<Frame> = (0u8..5)
            .map(|i| Frame::new(i, vec![i; (i as usize + 1) * 3]))
            .collect();

        let mut wire = BytesMut::new();
        for frame in &frames {
            enc.encode(frame.clone(), &mut wire).unwrap();
        }

        for expected in &frames {
            let out = dec.decode(&mut wire).unwrap().unwrap();
            assert_eq!(&out, expected);
        }
        assert!(wire.is_empty());
    }
}
