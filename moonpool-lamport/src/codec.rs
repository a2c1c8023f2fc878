//! Message payload encoding.
//!
//! A [`MessageCodec`] turns one protocol [`Message`] into the payload of a
//! wire frame and back. [`JsonCodec`] is the only format in use; its
//! payloads read like `{"kind":"request","timestamp":1,"sender":5000}`,
//! which keeps a captured TCP stream legible.

use crate::types::{Message, MessageKind};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Payload encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A message could not be turned into bytes.
    #[error("failed to encode {kind}: {source}")]
    Encode {
        /// Kind of the message being encoded.
        kind: MessageKind,
        /// Underlying serializer error.
        source: BoxError,
    },

    /// A payload is not a valid message.
    #[error("failed to decode {len}-byte payload: {source}")]
    Decode {
        /// Payload size.
        len: usize,
        /// Underlying deserializer error.
        source: BoxError,
    },
}

/// Payload format of protocol messages.
pub trait MessageCodec: Clone + Send + Sync + 'static {
    /// Encode `message` as a frame payload.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError>;

    /// Decode a frame payload.
    fn decode(&self, payload: &[u8]) -> Result<Message, CodecError>;
}

/// Tagged JSON payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|e| CodecError::Encode {
            kind: message.kind(),
            source: Box::new(e),
        })
    }

    fn decode(&self, payload: &[u8]) -> Result<Message, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Decode {
            len: payload.len(),
            source: Box::new(e),
        })
    }
}
