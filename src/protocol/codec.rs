//! Ordered-field record codec
//!
//! Every payload on the wire is a record whose fields are written one after
//! another in declaration order. [`WireCodec`] covers the primitive field
//! types, `Option<T>` (presence flag followed by the value) and `Vec<T>`
//! (var-int count followed by the elements); [`wire_record!`] derives the
//! codec for a struct from its field list.

use thiserror::Error;

use crate::net::buffer::PacketBuffer;

/// Packet decode error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketDecodeError {
    /// Not enough data in buffer
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    /// Invalid field value
    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    /// String bytes are not valid UTF-8
    #[error("Invalid string encoding")]
    InvalidStringEncoding,

    /// Malformed packet structure
    #[error("Malformed packet: {0}")]
    Malformed(String),
}

/// A value that can be written to and read back from a [`PacketBuffer`]
pub trait WireCodec: Sized {
    /// Append this value to the buffer
    fn encode(&self, buf: &mut PacketBuffer);

    /// Read a value from the buffer's current position
    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError>;

    /// Encode into a fresh byte vector
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = PacketBuffer::with_capacity(64);
        self.encode(&mut buf);
        buf.into_inner().to_vec()
    }

    /// Decode from a complete payload, rejecting trailing bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, PacketDecodeError> {
        let mut buf = PacketBuffer::from_bytes(bytes);
        let value = Self::decode(&mut buf)?;
        buf.expect_end()?;
        Ok(value)
    }
}

impl WireCodec for bool {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_bool(*self);
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        buf.read_bool()
    }
}

impl WireCodec for u16 {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_ushort(*self);
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        buf.read_ushort()
    }
}

impl WireCodec for i32 {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_int(*self);
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        buf.read_int()
    }
}

/// Unsigned values travel as their signed 32-bit bit pattern
impl WireCodec for u32 {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_int(*self as i32);
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        Ok(buf.read_int()? as u32)
    }
}

impl WireCodec for String {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_string(self);
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        buf.read_string()
    }
}

impl<T: WireCodec> WireCodec for Option<T> {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_bool(self.is_some());
        if let Some(value) = self {
            value.encode(buf);
        }
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        if buf.read_bool()? {
            Ok(Some(T::decode(buf)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: WireCodec> WireCodec for Vec<T> {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_length(self.len());
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(buf: &mut PacketBuffer) -> Result<Self, PacketDecodeError> {
        let count = buf.read_length()?;
        // Every element takes at least one byte, so a count beyond the
        // remaining bytes can only come from a corrupt payload.
        if count > buf.remaining() {
            return Err(PacketDecodeError::InvalidValue {
                field: "count".to_string(),
                value: count.to_string(),
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

/// Derive [`WireCodec`] for a struct by listing its fields in wire order.
///
/// ```ignore
/// wire_record!(Welcome { server_name, channels });
/// ```
#[macro_export]
macro_rules! wire_record {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::protocol::codec::WireCodec for $ty {
            fn encode(&self, buf: &mut $crate::net::buffer::PacketBuffer) {
                $( $crate::protocol::codec::WireCodec::encode(&self.$field, buf); )+
            }

            fn decode(
                buf: &mut $crate::net::buffer::PacketBuffer,
            ) -> ::std::result::Result<Self, $crate::protocol::codec::PacketDecodeError> {
                Ok(Self {
                    $( $field: $crate::protocol::codec::WireCodec::decode(buf)?, )+
                })
            }
        }
    };
}
