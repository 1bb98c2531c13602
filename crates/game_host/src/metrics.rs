//! Custom metrics shim.
//!
//! Counters go to a local StatsD agent in DogStatsD line format
//! (`name:value|c|#tags`). Metrics are fire-and-forget: a failed send is
//! logged at debug level and never reported to the caller.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Destination for session metrics.
pub trait MetricsSink: Send + Sync {
    /// Tag every subsequent metric with the given session id.
    fn set_session_tag(&self, session_id: &str);

    /// Increment counter `name` by `value`.
    fn increment(&self, name: &str, value: i64);
}

/// Discards everything. Used when metrics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn set_session_tag(&self, _session_id: &str) {}

    fn increment(&self, _name: &str, _value: i64) {}
}

/// Minimal StatsD client over a non-blocking UDP socket.
#[derive(Debug)]
pub struct StatsdClient {
    socket: UdpSocket,
    target: SocketAddr,
    common_tags: Mutex<Option<String>>,
}

impl StatsdClient {
    pub fn new(target: SocketAddr) -> std::io::Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            target,
            common_tags: Mutex::new(None),
        })
    }

    fn line(&self, name: &str, value: i64) -> String {
        let tags = self
            .common_tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match tags.as_deref() {
            Some(tags) => format!("{name}:{value}|c|{tags}"),
            None => format!("{name}:{value}|c"),
        }
    }
}

impl MetricsSink for StatsdClient {
    fn set_session_tag(&self, session_id: &str) {
        *self
            .common_tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(format!("#gamesession:{session_id}"));
    }

    fn increment(&self, name: &str, value: i64) {
        let line = self.line(name, value);
        match self.socket.send_to(line.as_bytes(), self.target) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!("Metrics socket busy, dropped {}", line);
            }
            Err(e) => debug!("Failed to send metric {}: {}", line, e),
        }
    }
}
