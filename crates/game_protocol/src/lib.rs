//! # Game Protocol
//!
//! Wire protocol spoken between the game host and connected game clients.
//!
//! * [`message`] - the [`Message`] value and its [`MessageKind`] tag
//! * [`codec`] - length-prefixed framing ([`FrameCodec`]) with incremental
//!   decoding that tolerates arbitrary stream fragmentation
//!
//! The crate is transport-agnostic: it transforms bytes and never touches a
//! socket, so clients and the host share one definition of the format.

pub mod codec;
pub mod message;

pub use codec::{Decoded, FrameCodec, ProtocolError, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_LEN};
pub use message::{Message, MessageKind};
