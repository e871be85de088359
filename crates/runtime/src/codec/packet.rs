//! packet
//!
//! Length-prefixed wire codec: `payload_length: u32_be || payload[length]`.
//! Integers and floats are both serialised big-endian; strings are
//! `u32_be length || raw bytes`. Generalises
//! `original_source/include/coro/net/packet/packet_codec.hpp`'s
//! `packet_serialisable`/`packet_deserialisable` concepts into one trait
//! pair.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::string::FromUtf8Error;

/// Size, in bytes, of the leading big-endian length prefix.
pub const METADATA_SIZE: usize = std::mem::size_of::<u32>();

#[derive(Debug)]
pub enum PacketError {
    /// Requested more bytes than remain between the cursor and the end of
    /// the payload.
    Underrun { want: usize, have: usize },
    Utf8(FromUtf8Error),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::Underrun { want, have } => {
                write!(f, "packet underrun: wanted {want} bytes, had {have}")
            }
            PacketError::Utf8(e) => write!(f, "packet string was not valid utf-8: {e}"),
        }
    }
}

impl std::error::Error for PacketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PacketError::Utf8(e) => Some(e),
            PacketError::Underrun { .. } => None,
        }
    }
}

/// Builds one packet's payload, then `finish()`es it into a framed buffer
/// with the leading length prefix filled in.
pub struct PacketWriter {
    buf: BytesMut,
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketWriter {
    pub fn new() -> Self {
        let mut buf = BytesMut::new();
        buf.put_u32(0); // placeholder length prefix, patched in `finish`
        Self { buf }
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16(v);
        self
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32(v);
        self
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.buf.put_u64(v);
        self
    }

    pub fn write_i32(&mut self, v: i32) -> &mut Self {
        self.buf.put_i32(v);
        self
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.buf.put_i64(v);
        self
    }

    /// Encoded big-endian, matching integers (a deliberate deviation from
    /// the original source, which left floats host-endian).
    pub fn write_f32(&mut self, v: f32) -> &mut Self {
        self.buf.put_u32(v.to_bits());
        self
    }

    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        self.buf.put_u64(v.to_bits());
        self
    }

    pub fn write_str(&mut self, v: &str) -> &mut Self {
        self.buf.put_u32(v.len() as u32);
        self.buf.put_slice(v.as_bytes());
        self
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.put_u32(v.len() as u32);
        self.buf.put_slice(v);
        self
    }

    /// Patch the leading length prefix with the payload size (everything
    /// after `METADATA_SIZE`) and return the framed buffer.
    pub fn finish(mut self) -> Bytes {
        let payload_len = (self.buf.len() - METADATA_SIZE) as u32;
        self.buf[..METADATA_SIZE].copy_from_slice(&payload_len.to_be_bytes());
        self.buf.freeze()
    }
}

/// Reads fields out of one packet's payload (length prefix already
/// stripped by the caller — see `decode_frame`). `peek` honors the cursor,
/// unlike `original_source/include/coro/net/packet/packet_reader.hpp`,
/// whose `peek()` always read from offset zero; that bug is not replicated
/// here.
pub struct PacketReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < n {
            return Err(PacketError::Underrun {
                want: n,
                have: self.remaining(),
            });
        }
        let slice = &self.data[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    /// Look at the next `n` bytes from the cursor without consuming them.
    pub fn peek(&self, n: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < n {
            return Err(PacketError::Underrun {
                want: n,
                have: self.remaining(),
            });
        }
        Ok(&self.data[self.cursor..self.cursor + n])
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, PacketError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, PacketError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, PacketError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, PacketError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, PacketError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_str(&mut self) -> Result<String, PacketError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?.to_vec();
        String::from_utf8(bytes).map_err(PacketError::Utf8)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, PacketError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

/// Bidirectional mapping between a Rust type and a packet payload, the
/// Rust-trait counterpart of the original source's
/// `packet_serialisable`/`packet_deserialisable` concepts.
pub trait PacketCodec: Sized {
    fn serialise(&self, writer: &mut PacketWriter);
    fn deserialise(reader: &mut PacketReader<'_>) -> Result<Self, PacketError>;
}

/// Strip the length prefix from `src` if a full frame is present, returning
/// the payload and the number of bytes consumed. Used by a `Decode` impl
/// layered over this codec (see `codec::Decode`).
pub fn decode_frame(src: &[u8]) -> Option<(&[u8], usize)> {
    if src.len() < METADATA_SIZE {
        return None;
    }
    let len = u32::from_be_bytes(src[..METADATA_SIZE].try_into().unwrap()) as usize;
    let total = METADATA_SIZE + len;
    if src.len() < total {
        return None;
    }
    Some((&src[METADATA_SIZE..total], total))
}

/// A `Decode` adapter for any `PacketCodec` type, framing over a byte
/// stream the way `codec::lines::LinesDecoder` frames over newlines.
pub struct PacketDecoder<T> {
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for PacketDecoder<T> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: PacketCodec> super::Decode for PacketDecoder<T> {
    type Item = T;
    type Error = PacketError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((payload, consumed)) = decode_frame(src) else {
            return Ok(None);
        };
        let mut reader = PacketReader::new(payload);
        let value = T::deserialise(&mut reader)?;
        src.advance(consumed);
        Ok(Some(value))
    }
}

impl<T: PacketCodec> super::SinkEncode for T {
    type Error = std::convert::Infallible;
    fn sink_encode(&self, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut writer = PacketWriter::new();
        self.serialise(&mut writer);
        dst.put_slice(&writer.finish());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: f64,
        y: f64,
        label: String,
    }

    impl PacketCodec for Point {
        fn serialise(&self, writer: &mut PacketWriter) {
            writer.write_f64(self.x).write_f64(self.y).write_str(&self.label);
        }

        fn deserialise(reader: &mut PacketReader<'_>) -> Result<Self, PacketError> {
            Ok(Point {
                x: reader.read_f64()?,
                y: reader.read_f64()?,
                label: reader.read_str()?,
            })
        }
    }

    #[test]
    fn round_trips_through_the_wire_format() {
        let point = Point {
            x: 1.5,
            y: -2.25,
            label: "origin".into(),
        };
        let mut writer = PacketWriter::new();
        point.serialise(&mut writer);
        let framed = writer.finish();

        let (payload, consumed) = decode_frame(&framed).expect("a full frame");
        assert_eq!(consumed, framed.len());
        let mut reader = PacketReader::new(payload);
        let decoded = Point::deserialise(&mut reader).unwrap();
        assert_eq!(decoded.x, 1.5);
        assert_eq!(decoded.y, -2.25);
        assert_eq!(decoded.label, "origin");
    }

    #[test]
    fn floats_are_encoded_big_endian() {
        let mut writer = PacketWriter::new();
        writer.write_f32(1.0);
        let framed = writer.finish();
        // IEEE-754 1.0f32 big-endian is 0x3F800000.
        assert_eq!(&framed[METADATA_SIZE..], &[0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn peek_honors_the_cursor() {
        let data = [1u8, 2, 3, 4];
        let mut reader = PacketReader::new(&data);
        let _ = reader.read_u8().unwrap();
        // A buggy peek reading from offset 0 would see `[1, 2]`; the
        // cursor-correct behavior sees the bytes that follow it instead.
        assert_eq!(reader.peek(2).unwrap(), &[2, 3]);
    }

    #[test]
    fn incomplete_frame_yields_none() {
        let mut writer = PacketWriter::new();
        writer.write_u32(42);
        let framed = writer.finish();
        assert!(decode_frame(&framed[..framed.len() - 1]).is_none());
    }
}
