use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{FlowMessage, MAX_MESSAGE_SIZE};

const KNOWN_TAGS: [u8; 7] = [1, 2, 3, 4, 5, 6, 255];

/// Codec for encoding/decoding issuance session messages.
pub struct FlowCodec;

impl FlowCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &FlowMessage) -> ProtocolResult<Bytes> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32(len);
        buf.put_u8(msg.type_tag());
        buf.put_slice(&payload);
        tracing::trace!(msg = msg.type_name(), bytes = buf.len(), "encoded frame");
        Ok(buf.freeze())
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(FlowMessage, usize)> {
        let Some((header, rest)) = data.split_first_chunk::<4>() else {
            return Err(ProtocolError::FramingError("too short".into()));
        };
        let len = u32::from_be_bytes(*header) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if rest.len() < len {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                4 + len
            )));
        }
        let tag = rest[0];
        if !KNOWN_TAGS.contains(&tag) {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        let msg = Self::decode_payload(&rest[1..len])?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::FramingError(format!(
                "tag {tag} does not match {} payload",
                msg.type_name()
            )));
        }
        Ok((msg, 4 + len))
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &FlowMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<FlowMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}
