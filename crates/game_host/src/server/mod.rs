//! Host runtime: the accept loop and the tick loop that drive a session.

pub mod core;

pub use self::core::{GameHost, InboxReceiver};
