//! Wire protocol definitions for HDHomeRun-compatible tuner devices.
//!
//! This crate implements the binary protocol DVR clients use to discover
//! and query network tuners: packet framing with a trailing CRC32C
//! checksum, and the tag-length-value attribute encoding carried inside
//! frame payloads.
//!
//! # Frame Format
//!
//! All integers are big-endian.
//!
//! ```text
//! +--------+--------+------------------+--------+
//! | Type   | Length |     Payload      | CRC32C |
//! | u16 BE | u16 BE |   Length bytes   | u32 BE |
//! +--------+--------+------------------+--------+
//! | 2 bytes| 2 bytes|                  | 4 bytes|
//! ```
//!
//! The checksum covers the header and payload. The checksum algorithm is
//! CRC32C (Castagnoli), not the older CRC32 polynomial.
//!
//! # Example
//!
//! ```rust
//! use hdhr_protocol::{decode_frame, encode_frame, parse_attributes, FrameType};
//!
//! let packet = encode_frame(FrameType::DiscoverReq.into(), &[]);
//! let frame = decode_frame(&packet).unwrap();
//! assert_eq!(frame.frame_type, u16::from(FrameType::DiscoverReq));
//! assert!(parse_attributes(&frame.payload).unwrap().is_empty());
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{
    build_attributes, decode_frame, encode_frame, parse_attributes, AttributeReader,
};
pub use error::ProtocolError;
pub use types::{Attribute, Frame, FrameType};
