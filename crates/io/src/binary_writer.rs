//! Little-endian binary writer producing the bytecode byte stream.

use bytes::{BufMut, BytesMut};

/// Append-only buffer used by the compiler to emit instructions.
pub struct BinaryWriter {
    buffer: BytesMut,
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { buffer: BytesMut::new() }
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buffer.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.put_u16_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.put_i32_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.put_u32_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buffer.put_i64_le(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buffer.put_f64_le(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    /// Writes a 2-byte little-endian length prefix followed by the payload.
    pub fn write_u16_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.write_u16(bytes.len() as u16);
        self.write_bytes(bytes);
    }

    /// Writes a 1-byte length prefix followed by the payload.
    pub fn write_u8_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.write_u8(bytes.len() as u8);
        self.write_bytes(bytes);
    }

    /// Overwrites an already-emitted `i32` operand at `offset`, used to patch
    /// forward jump targets once they become known.
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        let bytes = value.to_le_bytes();
        self.buffer[offset..offset + 4].copy_from_slice(&bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryReader;

    #[test]
    fn writer_and_reader_agree_on_encoding() {
        let mut w = BinaryWriter::new();
        w.write_u8(7);
        w.write_i64(-42);
        w.write_f64(3.5);
        w.write_u16_string("hi");

        let mut r = BinaryReader::new(w.into_vec());
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_i64().unwrap(), -42);
        assert_eq!(r.read_f64().unwrap(), 3.5);
        assert_eq!(r.read_u16_string().unwrap(), "hi");
    }

    #[test]
    fn patch_rewrites_a_jump_operand() {
        let mut w = BinaryWriter::new();
        w.write_u8(0xAA);
        let site = w.position();
        w.write_i32(-1);
        w.patch_i32(site, 123);
        let mut r = BinaryReader::new(w.into_vec());
        assert_eq!(r.read_u8().unwrap(), 0xAA);
        assert_eq!(r.read_i32().unwrap(), 123);
    }
}
