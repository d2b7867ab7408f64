//! Wire-level types and constants for the HDHomeRun protocol.

use bytes::Bytes;

/// UDP port clients send discovery requests to.
pub const DISCOVER_UDP_PORT: u16 = 65001;

/// TCP port for control exchanges. Same numeric value as the discovery
/// port by protocol convention; the transports are distinct.
pub const CONTROL_TCP_PORT: u16 = 65001;

/// Maximum size of a packet on the wire.
pub const MAX_PACKET_SIZE: usize = 1460;

/// Maximum payload size: a packet minus header and checksum.
pub const MAX_PAYLOAD_SIZE: usize = 1452;

/// Frame header size: type (u16) + payload length (u16).
pub const HEADER_SIZE: usize = 4;

/// Trailing CRC32C checksum size.
pub const CHECKSUM_SIZE: usize = 4;

/// Largest attribute value representable with a single-byte TLV length.
pub const MAX_ATTRIBUTE_LEN: usize = 127;

/// Device type advertised by tuner-class devices.
pub const DEVICE_TYPE_TUNER: u32 = 0x0000_0001;

/// Wildcard device type in discovery request filters.
pub const DEVICE_TYPE_WILDCARD: u32 = 0xFFFF_FFFF;

/// Wildcard device id in discovery request filters.
pub const DEVICE_ID_WILDCARD: u32 = 0xFFFF_FFFF;

/// Device type of the advertised device (4-byte value).
pub const TAG_DEVICE_TYPE: u8 = 0x01;
/// Device id of the advertised device (4-byte value).
pub const TAG_DEVICE_ID: u8 = 0x02;
/// Parameter name in get/set exchanges; also carries the base URL string
/// in discovery replies.
pub const TAG_GETSET_NAME: u8 = 0x03;
/// Parameter value in get/set exchanges.
pub const TAG_GETSET_VALUE: u8 = 0x04;
/// Error message string in failed get/set replies.
pub const TAG_ERROR_MESSAGE: u8 = 0x05;
/// Number of tuners the device exposes (1-byte value).
pub const TAG_TUNER_COUNT: u8 = 0x10;
/// Lock key for exclusive tuner access.
pub const TAG_GETSET_LOCKKEY: u8 = 0x15;
/// Device authentication token, binary form.
pub const TAG_DEVICE_AUTH_BIN: u8 = 0x29;
/// Base URL of the device's HTTP surface.
pub const TAG_BASE_URL: u8 = 0x2A;
/// Device authentication token, string form.
pub const TAG_DEVICE_AUTH_STR: u8 = 0x2B;

/// Frame types used by the discovery and control exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameType {
    /// Discovery request (client to device).
    DiscoverReq = 0x0002,
    /// Discovery reply (device to client).
    DiscoverRpy = 0x0003,
    /// Parameter get/set request (client to device).
    GetSetReq = 0x0004,
    /// Parameter get/set reply (device to client).
    GetSetRpy = 0x0005,
}

impl TryFrom<u16> for FrameType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            0x0002 => Ok(FrameType::DiscoverReq),
            0x0003 => Ok(FrameType::DiscoverRpy),
            0x0004 => Ok(FrameType::GetSetReq),
            0x0005 => Ok(FrameType::GetSetRpy),
            _ => Err(value),
        }
    }
}

impl From<FrameType> for u16 {
    fn from(value: FrameType) -> Self {
        value as u16
    }
}

/// A decoded frame: raw type and payload, checksum already verified.
///
/// Frames are immutable value objects; decode and encode construct fresh
/// ones and never mutate in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw frame type. Unknown values are kept as-is so callers decide
    /// how to treat them.
    pub frame_type: u16,
    /// Payload bytes between header and checksum.
    pub payload: Bytes,
}

/// A single tag-length-value attribute.
///
/// The wire length is implied by `value.len()`; only single-byte lengths
/// (values up to 127 bytes) are representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub tag: u8,
    pub value: Bytes,
}

impl Attribute {
    /// Attribute with an arbitrary byte value.
    pub fn new(tag: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Attribute with a single-byte value.
    pub fn from_u8(tag: u8, value: u8) -> Self {
        Self::new(tag, vec![value])
    }

    /// Attribute with a 4-byte big-endian value.
    pub fn from_u32(tag: u8, value: u32) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    /// Value as a single byte, if it is exactly one byte long.
    pub fn as_u8(&self) -> Option<u8> {
        if self.value.len() == 1 {
            Some(self.value[0])
        } else {
            None
        }
    }

    /// Value as a big-endian u32, if it is exactly four bytes long.
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.as_ref().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Value as UTF-8 text, if valid.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}
