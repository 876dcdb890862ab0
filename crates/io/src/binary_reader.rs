//! Little-endian binary reader over an owned byte buffer.

use crate::error::{IoError, IoResult};
use bytes::Bytes;

/// Cursor-based reader over the bytecode byte stream.
///
/// Mirrors the encoding rules of the compiler: all multi-byte integers are
/// little-endian, strings are length-prefixed (no terminator).
pub struct BinaryReader {
    data: Bytes,
    position: usize,
}

impl BinaryReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn need(&self, n: usize, context: &str) -> IoResult<()> {
        if self.remaining() < n {
            return Err(IoError::EndOfStream { needed: n - self.remaining(), context: context.to_string() });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.need(1, "u8")?;
        let b = self.data[self.position];
        self.position += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> IoResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> IoResult<u16> {
        self.need(2, "u16")?;
        let mut buf = [0u8; 2];
        buf.copy_from_slice(&self.data[self.position..self.position + 2]);
        self.position += 2;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i32(&mut self) -> IoResult<i32> {
        self.need(4, "i32")?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[self.position..self.position + 4]);
        self.position += 4;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self) -> IoResult<u32> {
        Ok(self.read_i32()? as u32)
    }

    pub fn read_i64(&mut self) -> IoResult<i64> {
        self.need(8, "i64")?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[self.position..self.position + 8]);
        self.position += 8;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_f64(&mut self) -> IoResult<f64> {
        self.need(8, "f64")?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[self.position..self.position + 8]);
        self.position += 8;
        Ok(f64::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self, length: usize) -> IoResult<Vec<u8>> {
        self.need(length, "byte array")?;
        let bytes = self.data.slice(self.position..self.position + length);
        self.position += length;
        Ok(bytes.to_vec())
    }

    /// Reads a 2-byte length prefix followed by that many bytes, decoded as UTF-8.
    ///
    /// This is the encoding `PUSH_STRING` and `CALL` use for their payloads.
    pub fn read_u16_string(&mut self) -> IoResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| IoError::InvalidUtf8 {
            context: "u16-prefixed string".to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads a 1-byte length prefix followed by that many bytes, decoded as UTF-8.
    ///
    /// Used for the `CALL` instruction's target name.
    pub fn read_u8_string(&mut self) -> IoResult<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| IoError::InvalidUtf8 {
            context: "u8-prefixed string".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn seek(&mut self, position: usize) -> IoResult<()> {
        if position > self.data.len() {
            return Err(IoError::OutOfBounds { position, length: self.data.len() });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> IoResult<()> {
        self.need(count, "skip")?;
        self.position += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fixed_width_fields() {
        let mut r = BinaryReader::new(vec![0x2a, 0x01, 0x00, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(r.read_u8().unwrap(), 0x2a);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert_eq!(r.read_i32().unwrap(), -1);
    }

    #[test]
    fn eof_is_reported_precisely() {
        let mut r = BinaryReader::new(vec![0u8; 1]);
        let err = r.read_u16().unwrap_err();
        assert!(matches!(err, IoError::EndOfStream { needed: 1, .. }));
    }

    #[test]
    fn reads_length_prefixed_strings() {
        let mut buf = vec![5, 0];
        buf.extend_from_slice(b"hello");
        let mut r = BinaryReader::new(buf);
        assert_eq!(r.read_u16_string().unwrap(), "hello");
    }
}
