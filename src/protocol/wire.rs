//! Checked big-endian cursor primitives for packet payloads.
//!
//! Every multi-byte field on the wire is big-endian; strings and lists are
//! prefixed with a u16 length. Reads are bounds-checked and surface
//! [`ProtocolError::MalformedPayload`] instead of panicking, so a hostile
//! or truncated payload can never take down the read loop by itself.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};

const EARLY_END: &str = "payload ended early";

/// Reading cursor over one packet payload.
pub struct PacketReader<'a> {
    buf: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(ProtocolError::MalformedPayload(EARLY_END));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    /// u16 element count preceding a list.
    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u16()? as usize)
    }

    /// u16-length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        if self.buf.remaining() < len {
            return Err(ProtocolError::MalformedPayload("string extends past payload"));
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(head.to_vec())
            .map_err(|_| ProtocolError::MalformedPayload("string is not valid UTF-8"))
    }
}

/// Writing cursor producing one packet payload.
#[derive(Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }

    /// u16 element count preceding a list.
    pub fn write_len(&mut self, n: usize) -> Result<()> {
        let n = u16::try_from(n)
            .map_err(|_| ProtocolError::MalformedPayload("list too long for u16 count"))?;
        self.buf.put_u16(n);
        Ok(())
    }

    /// u16-length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let len = u16::try_from(s.len())
            .map_err(|_| ProtocolError::MalformedPayload("string too long for u16 prefix"))?;
        self.buf.put_u16(len);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
