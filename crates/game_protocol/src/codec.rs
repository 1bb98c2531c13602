//! Length-prefixed framing for [`Message`] values.
//!
//! Wire format: a 4-byte big-endian unsigned length, then exactly that many
//! bytes of JSON-serialized message. Decoding works over whatever bytes the
//! caller has buffered so far and never consumes a partial frame, so a stream
//! split at arbitrary TCP segment boundaries decodes to the same messages.
//!
//! A length prefix of zero or above the codec's maximum is malformed. There
//! is no way to resynchronize a byte stream after a bad prefix, so callers
//! must drop the connection on [`ProtocolError`].

use crate::message::Message;
use thiserror::Error;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound on a frame payload (64 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024;

/// A frame could not be encoded or decoded. Fatal for the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame declares a zero-length payload")]
    ZeroLength,
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u64, max: u32 },
    #[error("frame payload is not a valid message: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Result of one decode step.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete message and the number of bytes it occupied, prefix included.
    Message(Message, usize),
    /// The buffer holds only part of a frame. Nothing was consumed.
    NeedMoreData,
}

/// Stateless frame encoder/decoder with a configurable payload limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCodec {
    max_frame_size: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Encode `message` into a freshly allocated frame.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        let mut frame = Vec::new();
        self.encode_into(message, &mut frame)?;
        Ok(frame)
    }

    /// Append the frame for `message` to `out`.
    ///
    /// On error `out` is left exactly as it was.
    pub fn encode_into(&self, message: &Message, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(message)?;
        let len = payload.len();
        if len > self.max_frame_size as usize {
            return Err(ProtocolError::FrameTooLarge {
                len: len as u64,
                max: self.max_frame_size,
            });
        }
        out.reserve(LENGTH_PREFIX_LEN + len);
        out.extend_from_slice(&(len as u32).to_be_bytes());
        out.extend_from_slice(&payload);
        Ok(())
    }

    /// Decode the first frame in `buf`.
    ///
    /// Returns [`Decoded::NeedMoreData`] while the prefix or payload is still
    /// incomplete. An out-of-range prefix is rejected as soon as the prefix
    /// itself is available, without waiting for the payload.
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded, ProtocolError> {
        let Some(prefix) = buf.get(..LENGTH_PREFIX_LEN) else {
            return Ok(Decoded::NeedMoreData);
        };
        let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
        len_bytes.copy_from_slice(prefix);
        let len = u32::from_be_bytes(len_bytes);

        if len == 0 {
            return Err(ProtocolError::ZeroLength);
        }
        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                len: u64::from(len),
                max: self.max_frame_size,
            });
        }

        let end = LENGTH_PREFIX_LEN + len as usize;
        let Some(payload) = buf.get(LENGTH_PREFIX_LEN..end) else {
            return Ok(Decoded::NeedMoreData);
        };
        let message = serde_json::from_slice(payload)?;
        Ok(Decoded::Message(message, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::signal(MessageKind::Connect),
            Message::new(MessageKind::PositionUpdate, vec![1, 2, 3, 4]),
            Message::new(MessageKind::GameEvent, b"score:17".to_vec()),
            Message::signal(MessageKind::Disconnect),
        ]
    }

    /// Feed `wire` to the codec `chunk` bytes at a time, the way a socket
    /// would hand them over, and collect every decoded message.
    fn decode_in_chunks(codec: &FrameCodec, wire: &[u8], chunk: usize) -> Vec<Message> {
        let mut buffered = Vec::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buffered.extend_from_slice(piece);
            loop {
                match codec.decode(&buffered).unwrap() {
                    Decoded::Message(msg, consumed) => {
                        decoded.push(msg);
                        buffered.drain(..consumed);
                    }
                    Decoded::NeedMoreData => break,
                }
            }
        }
        assert!(buffered.is_empty(), "trailing bytes left undecoded");
        decoded
    }

    #[test]
    fn frame_layout_is_big_endian_length_then_payload() {
        let codec = FrameCodec::default();
        let msg = Message::signal(MessageKind::Ready);
        let frame = codec.encode(&msg).unwrap();

        let payload = serde_json::to_vec(&msg).unwrap();
        assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], payload.as_slice());
    }

    #[test]
    fn fragmentation_does_not_change_decoded_messages() {
        let codec = FrameCodec::default();
        let messages = sample_messages();
        let mut wire = Vec::new();
        for msg in &messages {
            codec.encode_into(msg, &mut wire).unwrap();
        }

        for chunk in [1, 2, 3, 5, 7, 13, wire.len()] {
            assert_eq!(decode_in_chunks(&codec, &wire, chunk), messages, "chunk size {chunk}");
        }
    }

    #[test]
    fn partial_prefix_needs_more_data() {
        let codec = FrameCodec::default();
        assert_eq!(codec.decode(&[]).unwrap(), Decoded::NeedMoreData);
        assert_eq!(codec.decode(&[0, 0, 1]).unwrap(), Decoded::NeedMoreData);
    }

    #[test]
    fn truncated_payload_keeps_needing_more_data() {
        let codec = FrameCodec::default();
        let mut frame = codec
            .encode(&Message::new(MessageKind::GameEvent, vec![9; 32]))
            .unwrap();
        frame.truncate(frame.len() - 1);

        for _ in 0..3 {
            assert_eq!(codec.decode(&frame).unwrap(), Decoded::NeedMoreData);
        }
    }

    #[test]
    fn oversized_prefix_is_malformed_before_payload_arrives() {
        let codec = FrameCodec::new(1024);
        let prefix = 1025u32.to_be_bytes();
        let err = codec.decode(&prefix).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { len: 1025, max: 1024 }));
    }

    #[test]
    fn max_u32_prefix_is_malformed() {
        let codec = FrameCodec::default();
        let err = codec.decode(&u32::MAX.to_be_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[test]
    fn zero_length_prefix_is_malformed() {
        let codec = FrameCodec::default();
        let err = codec.decode(&[0, 0, 0, 0, 1, 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::ZeroLength));
    }

    #[test]
    fn garbage_payload_is_malformed() {
        let codec = FrameCodec::default();
        let mut frame = 3u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"{{{");
        let err = codec.decode(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload(_)));
    }

    #[test]
    fn encode_refuses_payload_over_limit() {
        let codec = FrameCodec::new(16);
        let mut out = vec![0xAA];
        let err = codec
            .encode_into(&Message::new(MessageKind::GameEvent, vec![0; 64]), &mut out)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { max: 16, .. }));
        assert_eq!(out, vec![0xAA]);
    }

    #[test]
    fn decode_reports_only_the_first_frame() {
        let codec = FrameCodec::default();
        let first = codec.encode(&Message::signal(MessageKind::Connect)).unwrap();
        let mut wire = first.clone();
        codec
            .encode_into(&Message::signal(MessageKind::Ready), &mut wire)
            .unwrap();

        match codec.decode(&wire).unwrap() {
            Decoded::Message(msg, consumed) => {
                assert_eq!(msg.kind, MessageKind::Connect);
                assert_eq!(consumed, first.len());
            }
            Decoded::NeedMoreData => panic!("expected a complete frame"),
        }
    }
}
