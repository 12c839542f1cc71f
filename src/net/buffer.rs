//! Packet buffer implementation
//!
//! Provides a byte buffer with the read/write operations used by the sync
//! protocol:
//! - Fixed-width big-endian integers (u16, i32)
//! - Booleans as a single byte
//! - Var-ints (LEB128 of a 32-bit value, at most 5 bytes)
//! - Length-prefixed UTF-8 strings
//!
//! Reads never panic: running past the end of the buffer, oversized strings
//! and invalid UTF-8 come back as [`PacketDecodeError`].

use bytes::{BufMut, BytesMut};

use crate::protocol::codec::PacketDecodeError;

/// Maximum encoded string length in bytes
pub const MAX_STRING_LENGTH: usize = 32767;

/// Maximum number of bytes a var-int may occupy
pub const MAX_VAR_INT_BYTES: usize = 5;

/// Packet buffer for reading and writing protocol payloads
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    /// Internal byte buffer
    data: BytesMut,
    /// Current read position
    read_pos: usize,
}

impl PacketBuffer {
    /// Create a new empty packet buffer
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            read_pos: 0,
        }
    }

    /// Create a packet buffer with a specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Create a packet buffer from existing bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            read_pos: 0,
        }
    }

    // ============ Properties ============

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Check if there are bytes remaining to read
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Get a reference to the underlying bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the underlying BytesMut
    #[inline]
    pub fn into_inner(self) -> BytesMut {
        self.data
    }

    /// Clear the buffer and reset the read position
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Fail unless at least `count` bytes are left to read
    fn require(&self, count: usize) -> Result<(), PacketDecodeError> {
        if self.remaining() < count {
            return Err(PacketDecodeError::InsufficientData {
                expected: count,
                actual: self.remaining(),
            });
        }
        Ok(())
    }

    /// Fail if any unread bytes are left
    pub fn expect_end(&self) -> Result<(), PacketDecodeError> {
        if self.has_remaining() {
            return Err(PacketDecodeError::Malformed(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }

    // ============ Reading Methods ============

    /// Read an unsigned byte
    pub fn read_ubyte(&mut self) -> Result<u8, PacketDecodeError> {
        self.require(1)?;
        let value = self.data[self.read_pos];
        self.read_pos += 1;
        Ok(value)
    }

    /// Read a boolean (any non-zero byte is true)
    pub fn read_bool(&mut self) -> Result<bool, PacketDecodeError> {
        Ok(self.read_ubyte()? != 0)
    }

    /// Read an unsigned big-endian short (2 bytes)
    pub fn read_ushort(&mut self) -> Result<u16, PacketDecodeError> {
        self.require(2)?;
        let pos = self.read_pos;
        self.read_pos += 2;
        Ok(u16::from_be_bytes([self.data[pos], self.data[pos + 1]]))
    }

    /// Read a signed big-endian int (4 bytes)
    pub fn read_int(&mut self) -> Result<i32, PacketDecodeError> {
        self.require(4)?;
        let pos = self.read_pos;
        self.read_pos += 4;
        Ok(i32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]))
    }

    /// Read a var-int (7 bits per byte, high bit set on continuation)
    pub fn read_var_int(&mut self) -> Result<i32, PacketDecodeError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VAR_INT_BYTES {
            let byte = self.read_ubyte()?;
            value |= ((byte & 0x7f) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(PacketDecodeError::Malformed(
            "var-int longer than 5 bytes".to_string(),
        ))
    }

    /// Read a non-negative var-int used as a length or element count
    pub fn read_length(&mut self) -> Result<usize, PacketDecodeError> {
        let value = self.read_var_int()?;
        if value < 0 {
            return Err(PacketDecodeError::InvalidValue {
                field: "length".to_string(),
                value: value.to_string(),
            });
        }
        Ok(value as usize)
    }

    /// Read a var-int length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, PacketDecodeError> {
        let length = self.read_length()?;
        if length > MAX_STRING_LENGTH {
            return Err(PacketDecodeError::InvalidValue {
                field: "string length".to_string(),
                value: length.to_string(),
            });
        }
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| PacketDecodeError::InvalidStringEncoding)
    }

    /// Read a specific number of bytes
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, PacketDecodeError> {
        self.require(length)?;
        let end = self.read_pos + length;
        let bytes = self.data[self.read_pos..end].to_vec();
        self.read_pos = end;
        Ok(bytes)
    }

    // ============ Writing Methods ============

    /// Write an unsigned byte
    pub fn write_ubyte(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write a boolean as a single byte
    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(value as u8);
    }

    /// Write an unsigned big-endian short (2 bytes)
    pub fn write_ushort(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    /// Write a signed big-endian int (4 bytes)
    pub fn write_int(&mut self, value: i32) {
        self.data.put_i32(value);
    }

    /// Write a var-int
    pub fn write_var_int(&mut self, value: i32) {
        let mut remaining = value as u32;
        loop {
            if remaining & !0x7f == 0 {
                self.write_ubyte(remaining as u8);
                return;
            }
            self.write_ubyte(((remaining & 0x7f) | 0x80) as u8);
            remaining >>= 7;
        }
    }

    /// Write a length or element count as a var-int
    pub fn write_length(&mut self, length: usize) {
        self.write_var_int(length as i32);
    }

    /// Write a var-int length-prefixed UTF-8 string
    ///
    /// Strings longer than [`MAX_STRING_LENGTH`] bytes are truncated at the
    /// last character boundary that fits.
    pub fn write_string(&mut self, value: &str) {
        let mut end = value.len().min(MAX_STRING_LENGTH);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.write_length(end);
        self.data.extend_from_slice(&value.as_bytes()[..end]);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for PacketBuffer {
    fn from(vec: Vec<u8>) -> Self {
        Self::from_bytes(&vec)
    }
}

impl From<&[u8]> for PacketBuffer {
    fn from(slice: &[u8]) -> Self {
        Self::from_bytes(slice)
    }
}

impl AsRef<[u8]> for PacketBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
