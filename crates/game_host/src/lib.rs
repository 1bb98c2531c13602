//! # Game Host
//!
//! Runtime core for a dedicated game server process that hosts one game
//! session on behalf of an orchestration platform. The platform starts the
//! process, assigns it a session, may keep filling empty slots through
//! matchmaking backfill, and eventually tells it to shut down.
//!
//! ## Architecture Overview
//!
//! * **Session lifecycle** ([`lifecycle`]) - a single-writer state machine
//!   driven by the tick loop. Platform callbacks arrive on foreign threads and
//!   are queued through a [`LifecycleHandle`] rather than applied in place.
//! * **Session clock** ([`clock`]) - the wait-for-players and session-duration
//!   timers, advanced by measured tick deltas.
//! * **Backfill** ([`backfill`]) - tracks the matchmaking ticket and stops it
//!   once at teardown.
//! * **Connections** ([`connection`]) - framed, non-blocking client channels
//!   in a concurrent registry shared with the accept loop.
//! * **Platform seam** ([`platform`]) - the operations the host performs
//!   against the orchestration platform, plus an in-process
//!   [`LocalPlatform`] for running without it.
//! * **Runtime** ([`server`]) - the accept loop and the tick loop.
//!
//! ## Session Flow
//!
//! 1. The process declares itself ready and waits, `Idle`
//! 2. The platform activates a session: `AwaitingPlayers`
//! 3. The first client `Connect` starts the game: `Active`
//! 4. Nobody joined within the wait limit, the game hit its maximum length,
//!    or someone asked to stop: every client is disconnected, backfill is
//!    stopped, the platform is told the process is ending, and the process
//!    exits
//!
//! Failures are scoped: a bad client frame closes that one connection, and a
//! failed platform call during teardown is logged without skipping the
//! remaining steps.

pub mod backfill;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod platform;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::{Args, Config};
pub use connection::{ClientId, ConnectionRegistry};
pub use error::{BackfillCancelError, ChannelError, PlatformCallError, ServerError};
pub use lifecycle::{LifecycleConfig, LifecycleEvent, LifecycleHandle, SessionLifecycleManager};
pub use metrics::{MetricsSink, NoopMetrics, StatsdClient};
pub use platform::{GameSessionInfo, LocalPlatform, OrchestrationPlatform, SessionUpdate};
pub use server::GameHost;
pub use session::SessionPhase;
