//! A single client connection.
//!
//! [`ConnectionChannel`] owns one non-blocking byte stream and turns it into
//! discrete [`Message`]s using the shared [`FrameCodec`]. Reads never block:
//! when the socket has nothing more to give, draining stops and whatever
//! partial frame is buffered waits for the next call.

use crate::error::ChannelError;
use game_protocol::{Decoded, FrameCodec, Message};
use std::io::{self, ErrorKind, Read, Write};
use tracing::{debug, trace};

/// Bytes requested from the stream per read call.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Upper bound on read calls per drain so a flooding peer cannot starve the tick loop.
const MAX_READS_PER_DRAIN: usize = 64;

/// Unsent bytes allowed to pile up behind a client that stopped reading.
const MAX_OUTBOUND_BACKLOG: usize = 4 * 1024 * 1024;

/// One persistent stream connection to a game client.
///
/// The stream must already be in non-blocking mode. Once closed, for any
/// reason, the channel never touches the stream again.
pub struct ConnectionChannel<S> {
    stream: Option<S>,
    codec: FrameCodec,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
}

impl<S: Read + Write> ConnectionChannel<S> {
    pub fn new(stream: S, codec: FrameCodec) -> Self {
        Self {
            stream: Some(stream),
            codec,
            inbound: Vec::new(),
            outbound: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Decode every complete message currently available on the stream.
    ///
    /// Decoded messages are appended to `out`, including the ones that
    /// arrived before a failure, and the number appended is returned. A
    /// partial trailing frame is not an error; it stays buffered until more
    /// bytes arrive.
    ///
    /// # Errors
    ///
    /// * [`ChannelError::Protocol`] - a malformed frame; the channel is closed
    /// * [`ChannelError::Disconnected`] - the peer went away; the channel is closed
    /// * [`ChannelError::Closed`] - the channel was closed earlier; nothing was read
    pub fn drain_messages(&mut self, out: &mut Vec<Message>) -> Result<usize, ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::Closed);
        };

        let before = out.len();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut result = Ok(());

        for _ in 0..MAX_READS_PER_DRAIN {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    result = Err(ChannelError::Disconnected);
                    break;
                }
                Ok(n) => {
                    self.inbound.extend_from_slice(&chunk[..n]);
                    if let Err(e) = decode_buffered(&self.codec, &mut self.inbound, out) {
                        result = Err(e.into());
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read failed: {}", e);
                    result = Err(ChannelError::Disconnected);
                    break;
                }
            }
        }

        match result {
            Ok(()) => Ok(out.len() - before),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Encode `message` and write it to the stream.
    ///
    /// Bytes the socket cannot take right now are kept and written ahead of
    /// the next frame, so a slow reader never sees a torn frame.
    ///
    /// # Errors
    ///
    /// * [`ChannelError::Protocol`] - the message is too large to frame; the channel stays open
    /// * [`ChannelError::SendFailed`] - the stream is gone or the write failed; the channel is closed
    pub fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        if self.stream.is_none() {
            return Err(ChannelError::SendFailed(io::Error::new(
                ErrorKind::NotConnected,
                "connection is closed",
            )));
        }
        self.codec.encode_into(message, &mut self.outbound)?;
        self.flush()
    }

    /// Write as much of the pending outbound backlog as the stream accepts.
    pub fn flush(&mut self) -> Result<(), ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::SendFailed(io::Error::new(
                ErrorKind::NotConnected,
                "connection is closed",
            )));
        };

        let mut written = 0;
        let result = loop {
            if written == self.outbound.len() {
                break Ok(());
            }
            match stream.write(&self.outbound[written..]) {
                Ok(0) => break Err(io::Error::from(ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        self.outbound.drain(..written);

        let result = result.and_then(|()| {
            if self.outbound.len() > MAX_OUTBOUND_BACKLOG {
                Err(io::Error::new(
                    ErrorKind::Other,
                    format!("outbound backlog of {} bytes exceeded", self.outbound.len()),
                ))
            } else {
                Ok(())
            }
        });

        if let Err(e) = result {
            self.close();
            return Err(ChannelError::SendFailed(e));
        }
        Ok(())
    }

    /// Close the channel, giving any buffered outbound bytes one last chance.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if !self.outbound.is_empty() {
                if let Err(e) = stream.write(&self.outbound) {
                    trace!("Dropping {} unsent bytes on close: {}", self.outbound.len(), e);
                }
            }
            let _ = stream.flush();
        }
        self.inbound.clear();
        self.outbound.clear();
    }
}

/// Send to a connection that may not exist yet.
///
/// Message producers should not have to special-case clients that are not
/// connected, so `None` is a successful no-op.
pub fn send_message<S: Read + Write>(
    channel: Option<&mut ConnectionChannel<S>>,
    message: &Message,
) -> Result<(), ChannelError> {
    match channel {
        Some(channel) => channel.send(message),
        None => {
            trace!("Dropping {:?} message for absent connection", message.kind);
            Ok(())
        }
    }
}

fn decode_buffered(
    codec: &FrameCodec,
    inbound: &mut Vec<u8>,
    out: &mut Vec<Message>,
) -> Result<(), game_protocol::ProtocolError> {
    let mut offset = 0;
    let result = loop {
        match codec.decode(&inbound[offset..]) {
            Ok(Decoded::Message(message, consumed)) => {
                out.push(message);
                offset += consumed;
            }
            Ok(Decoded::NeedMoreData) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    inbound.drain(..offset);
    result
}
