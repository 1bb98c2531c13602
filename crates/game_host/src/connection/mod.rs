//! Client connection management.
//!
//! * [`channel`] - one framed, non-blocking client stream
//! * [`registry`] - the concurrent set of all live channels, shared between
//!   the accept path and session teardown

pub mod channel;
pub mod registry;

pub use channel::{send_message, ConnectionChannel};
pub use registry::{ClientId, ConnectionRegistry};
