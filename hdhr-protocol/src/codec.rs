//! Frame and attribute codecs.
//!
//! Frame format (all integers big-endian):
//!
//! ```text
//! +--------+--------+------------------+--------+
//! | Type   | Length |     Payload      | CRC32C |
//! | u16 BE | u16 BE |   Length bytes   | u32 BE |
//! +--------+--------+------------------+--------+
//! ```
//!
//! Attributes inside a payload are tag-length-value with a 1-byte tag and
//! a 1-byte length. Lengths above 127 would need the multi-byte length
//! extension, which is not implemented; such payloads are rejected.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::types::{Attribute, Frame, CHECKSUM_SIZE, HEADER_SIZE, MAX_ATTRIBUTE_LEN, MAX_PAYLOAD_SIZE};

/// Encode a frame: header, payload, trailing CRC32C over header and payload.
///
/// Callers keep payloads within [`MAX_PAYLOAD_SIZE`] to respect the wire
/// MTU; the codec does not enforce the bound.
pub fn encode_frame(frame_type: u16, payload: &[u8]) -> Bytes {
    debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);

    let mut packet = BytesMut::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    packet.put_u16(frame_type);
    packet.put_u16(payload.len() as u16);
    packet.put_slice(payload);
    let checksum = crc32c::crc32c(&packet);
    packet.put_u32(checksum);
    packet.freeze()
}

/// Decode one packet into a frame, verifying declared length and checksum.
pub fn decode_frame(packet: &[u8]) -> Result<Frame, ProtocolError> {
    if packet.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(ProtocolError::Truncated {
            expected: HEADER_SIZE + CHECKSUM_SIZE,
            actual: packet.len(),
        });
    }

    let (body, trailer) = packet.split_at(packet.len() - CHECKSUM_SIZE);
    let frame_type = u16::from_be_bytes([body[0], body[1]]);
    let declared = u16::from_be_bytes([body[2], body[3]]) as usize;
    let payload = &body[HEADER_SIZE..];

    if declared != payload.len() {
        return Err(ProtocolError::BadLength {
            declared,
            actual: payload.len(),
        });
    }

    let expected = crc32c::crc32c(body);
    let actual = u32::from_be_bytes(trailer.try_into().unwrap());
    if expected != actual {
        return Err(ProtocolError::BadChecksum { expected, actual });
    }

    Ok(Frame {
        frame_type,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Bounded cursor over the tag-length-value attributes of a payload.
///
/// Yields attributes in encounter order and never reads past the end of
/// the buffer. Restartable: construct a new reader to iterate again.
#[derive(Debug)]
pub struct AttributeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> AttributeReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { buf: payload, pos: 0 }
    }

    /// Read the next attribute, or `Ok(None)` at the end of the buffer.
    pub fn next_attribute(&mut self) -> Result<Option<Attribute>, ProtocolError> {
        let remaining = self.buf.len() - self.pos;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < 2 {
            return Err(ProtocolError::Truncated {
                expected: 2,
                actual: remaining,
            });
        }

        let tag = self.buf[self.pos];
        let length = self.buf[self.pos + 1] as usize;
        if length > MAX_ATTRIBUTE_LEN {
            return Err(ProtocolError::UnsupportedLength(length));
        }

        let start = self.pos + 2;
        if self.buf.len() - start < length {
            return Err(ProtocolError::Truncated {
                expected: length,
                actual: self.buf.len() - start,
            });
        }

        let value = Bytes::copy_from_slice(&self.buf[start..start + length]);
        self.pos = start + length;
        Ok(Some(Attribute { tag, value }))
    }
}

/// Parse every attribute in a payload, preserving encounter order.
pub fn parse_attributes(payload: &[u8]) -> Result<Vec<Attribute>, ProtocolError> {
    let mut reader = AttributeReader::new(payload);
    let mut attrs = Vec::new();
    while let Some(attr) = reader.next_attribute()? {
        attrs.push(attr);
    }
    Ok(attrs)
}

/// Concatenate attributes as tag-length-value in the given order.
///
/// Order is caller-controlled and significant: clients expect reply
/// attributes in the order real devices emit them.
pub fn build_attributes(attrs: &[Attribute]) -> Result<Bytes, ProtocolError> {
    let mut payload = BytesMut::new();
    for attr in attrs {
        if attr.value.len() > MAX_ATTRIBUTE_LEN {
            return Err(ProtocolError::UnsupportedLength(attr.value.len()));
        }
        payload.put_u8(attr.tag);
        payload.put_u8(attr.value.len() as u8);
        payload.put_slice(&attr.value);
    }
    Ok(payload.freeze())
}
