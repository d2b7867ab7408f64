//! Request interpretation: turns one request packet into an optional
//! reply packet.
//!
//! Real tuners never answer malformed or unrecognized requests with error
//! frames; they stay silent and let the client's own timeout handle it.
//! Every protocol-level failure here therefore resolves to `None`.

use bytes::Bytes;
use log::{debug, trace};

use hdhr_protocol::codec::{build_attributes, decode_frame, encode_frame, parse_attributes};
use hdhr_protocol::types::{
    Attribute, FrameType, DEVICE_TYPE_TUNER, TAG_DEVICE_ID, TAG_DEVICE_TYPE, TAG_GETSET_NAME,
    TAG_GETSET_VALUE, TAG_TUNER_COUNT,
};

use crate::config::DeviceIdentity;

/// Interpret one request packet and produce the reply packet, if any.
pub fn process_packet(packet: &[u8], identity: &DeviceIdentity) -> Option<Bytes> {
    let frame = match decode_frame(packet) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Discarding undecodable packet: {}", e);
            return None;
        }
    };

    match FrameType::try_from(frame.frame_type) {
        Ok(FrameType::DiscoverReq) => discover_reply(identity),
        Ok(FrameType::GetSetReq) => getset_reply(&frame.payload),
        Ok(other) => {
            trace!("Ignoring reply-type frame {:?}", other);
            None
        }
        Err(value) => {
            trace!("Ignoring unknown frame type {:#06x}", value);
            None
        }
    }
}

/// Build the discovery reply.
///
/// Attribute order is part of the wire contract: device type, device id,
/// base URL (as a name attribute), tuner count.
fn discover_reply(identity: &DeviceIdentity) -> Option<Bytes> {
    let attrs = [
        Attribute::from_u32(TAG_DEVICE_TYPE, DEVICE_TYPE_TUNER),
        Attribute::from_u32(TAG_DEVICE_ID, identity.device_id),
        Attribute::new(TAG_GETSET_NAME, identity.base_url.clone().into_bytes()),
        Attribute::from_u8(TAG_TUNER_COUNT, identity.tuner_count),
    ];
    // The base URL is validated against the single-byte length limit at
    // startup, so building cannot fail for a valid identity.
    let payload = build_attributes(&attrs).ok()?;
    Some(encode_frame(FrameType::DiscoverRpy.into(), &payload))
}

/// Build the get/set reply: echo the queried name (and value, when one
/// was sent) back to the client.
///
/// Parameter storage is not implemented; the echo is enough for clients
/// probing device liveness. A request without a name attribute is
/// malformed and gets no reply.
fn getset_reply(payload: &[u8]) -> Option<Bytes> {
    let attrs = match parse_attributes(payload) {
        Ok(attrs) => attrs,
        Err(e) => {
            debug!("Discarding get/set request: {}", e);
            return None;
        }
    };

    let mut name = None;
    let mut value = None;
    for attr in attrs {
        match attr.tag {
            TAG_GETSET_NAME => name = Some(attr),
            TAG_GETSET_VALUE => value = Some(attr),
            _ => {}
        }
    }

    let name = name?;
    let mut reply = vec![name];
    if let Some(value) = value {
        reply.push(value);
    }

    let payload = build_attributes(&reply).ok()?;
    Some(encode_frame(FrameType::GetSetRpy.into(), &payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdhr_protocol::codec::decode_frame;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("12345678", 4, "http://127.0.0.1:80".to_string()).unwrap()
    }

    #[test]
    fn test_discover_reply_attributes() {
        let request = encode_frame(FrameType::DiscoverReq.into(), &[]);
        let reply = process_packet(&request, &identity()).unwrap();

        let frame = decode_frame(&reply).unwrap();
        assert_eq!(frame.frame_type, u16::from(FrameType::DiscoverRpy));

        let attrs = parse_attributes(&frame.payload).unwrap();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].tag, TAG_DEVICE_TYPE);
        assert_eq!(attrs[0].as_u32(), Some(DEVICE_TYPE_TUNER));
        assert_eq!(attrs[1].tag, TAG_DEVICE_ID);
        assert_eq!(attrs[1].as_u32(), Some(0x1234_5678));
        assert_eq!(attrs[2].tag, TAG_GETSET_NAME);
        assert_eq!(attrs[2].as_str(), Some("http://127.0.0.1:80"));
        assert_eq!(attrs[3].tag, TAG_TUNER_COUNT);
        assert_eq!(attrs[3].as_u8(), Some(4));
    }

    #[test]
    fn test_getset_echoes_name_only() {
        let payload =
            build_attributes(&[Attribute::new(TAG_GETSET_NAME, &b"ChannelMap"[..])]).unwrap();
        let request = encode_frame(FrameType::GetSetReq.into(), &payload);
        let reply = process_packet(&request, &identity()).unwrap();

        let frame = decode_frame(&reply).unwrap();
        assert_eq!(frame.frame_type, u16::from(FrameType::GetSetRpy));

        let attrs = parse_attributes(&frame.payload).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].tag, TAG_GETSET_NAME);
        assert_eq!(attrs[0].as_str(), Some("ChannelMap"));
    }

    #[test]
    fn test_getset_echoes_name_and_value() {
        let payload = build_attributes(&[
            Attribute::new(TAG_GETSET_NAME, &b"/tuner0/channel"[..]),
            Attribute::new(TAG_GETSET_VALUE, &b"auto:501"[..]),
        ])
        .unwrap();
        let request = encode_frame(FrameType::GetSetReq.into(), &payload);
        let reply = process_packet(&request, &identity()).unwrap();

        let attrs = parse_attributes(&decode_frame(&reply).unwrap().payload).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].tag, TAG_GETSET_NAME);
        assert_eq!(attrs[1].tag, TAG_GETSET_VALUE);
        assert_eq!(attrs[1].as_str(), Some("auto:501"));
    }

    #[test]
    fn test_getset_without_name_is_dropped() {
        let payload =
            build_attributes(&[Attribute::new(TAG_GETSET_VALUE, &b"auto:501"[..])]).unwrap();
        let request = encode_frame(FrameType::GetSetReq.into(), &payload);
        assert_eq!(process_packet(&request, &identity()), None);
    }

    #[test]
    fn test_getset_with_unsupported_length_is_dropped() {
        // A name attribute declaring a 128-byte value.
        let mut payload = vec![TAG_GETSET_NAME, 0x80];
        payload.extend_from_slice(&[b'x'; 128]);
        let request = encode_frame(FrameType::GetSetReq.into(), &payload);
        assert_eq!(process_packet(&request, &identity()), None);
    }

    #[test]
    fn test_reply_types_are_ignored() {
        let request = encode_frame(FrameType::DiscoverRpy.into(), &[]);
        assert_eq!(process_packet(&request, &identity()), None);
    }

    #[test]
    fn test_unknown_frame_type_is_ignored() {
        let request = encode_frame(0x00FF, &[]);
        assert_eq!(process_packet(&request, &identity()), None);
    }

    #[test]
    fn test_corrupt_packet_is_ignored() {
        let mut request = encode_frame(FrameType::DiscoverReq.into(), &[]).to_vec();
        let last = request.len() - 1;
        request[last] ^= 0xFF;
        assert_eq!(process_packet(&request, &identity()), None);
    }
}
