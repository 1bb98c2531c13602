//! End-to-end tests: a real host on loopback TCP, driven through `LocalPlatform`.

use game_host::config::Config;
use game_host::lifecycle::HealthCheck;
use game_host::platform::{ProcessParameters, StopBackfillRequest};
use game_host::server::InboxReceiver;
use game_host::{
    ClientId, ConnectionRegistry, GameHost, GameSessionInfo, LocalPlatform, NoopMetrics,
    OrchestrationPlatform, PlatformCallError, ServerError,
};
use game_protocol::{Decoded, FrameCodec, Message, MessageKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const SESSION_ID: &str = "arn:aws:gamelift:us-east-1::gamesession/fleet-1/gsess-1";
const CONFIG_ARN: &str = "arn:aws:gamelift:us-east-1:1:matchmakingconfiguration/cfg";
const DEADLINE: Duration = Duration::from_secs(5);

struct RunningHost {
    addr: SocketAddr,
    task: JoinHandle<Result<(), ServerError>>,
    shutdown: Option<oneshot::Sender<()>>,
    inbox: InboxReceiver,
    registry: Arc<ConnectionRegistry>,
}

impl RunningHost {
    async fn start(config: Config, platform: Arc<dyn OrchestrationPlatform>) -> Self {
        Self::launch(GameHost::new(config, platform, Arc::new(NoopMetrics)).unwrap()).await
    }

    async fn launch(mut host: GameHost) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let inbox = host.take_inbox().unwrap();
        let registry = host.registry();
        let task = tokio::spawn(host.run(listener, async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            task,
            shutdown: Some(shutdown_tx),
            inbox,
            registry,
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    async fn next_message(&mut self) -> (ClientId, Message) {
        timeout(DEADLINE, self.inbox.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("host dropped the inbox")
    }

    async fn finish(self) -> Result<(), ServerError> {
        timeout(DEADLINE, self.task)
            .await
            .expect("host did not exit")
            .unwrap()
    }
}

fn test_config(wait_for_players_secs: f64) -> Config {
    let mut config = Config::default();
    config.server.tick_rate_ms = 5;
    config.session.wait_for_players_secs = wait_for_players_secs;
    config.metrics.enabled = false;
    config
}

async fn wait_until_ready(platform: &LocalPlatform) {
    timeout(DEADLINE, async {
        while platform.ready_port().is_none() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("host never became ready");
}

async fn wait_until_activated(platform: &LocalPlatform) {
    timeout(DEADLINE, async {
        while !platform.is_session_activated() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("session was never activated");
}

async fn activate(platform: &LocalPlatform, matchmaker_data: Option<String>) {
    wait_until_ready(platform).await;
    platform
        .activate_session_locally(GameSessionInfo {
            game_session_id: SESSION_ID.to_string(),
            matchmaker_data,
            ..Default::default()
        })
        .unwrap();
}

async fn send(stream: &mut TcpStream, message: &Message) {
    let frame = FrameCodec::default().encode(message).unwrap();
    stream.write_all(&frame).await.unwrap();
}

/// Reads the next message, or `None` once the host has closed the connection.
async fn read_message(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Option<Message> {
    let codec = FrameCodec::default();
    loop {
        if let Decoded::Message(message, consumed) = codec.decode(buffer).unwrap() {
            buffer.drain(..consumed);
            return Some(message);
        }
        let mut chunk = [0u8; 1024];
        match timeout(DEADLINE, stream.read(&mut chunk)).await.unwrap() {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}

#[tokio::test]
async fn idle_session_times_out_and_process_exits() {
    let platform = Arc::new(LocalPlatform::new());
    let host = RunningHost::start(test_config(0.1), platform.clone()).await;

    activate(&platform, None).await;
    host.finish().await.unwrap();

    assert!(platform.is_session_activated());
    assert_eq!(platform.process_ending_calls(), 1);
    assert!(platform.is_destroyed());
    assert!(platform.backfill_stops().is_empty());
}

#[tokio::test]
async fn first_connect_starts_the_game_and_shutdown_disconnects_everyone() {
    let platform = Arc::new(LocalPlatform::new());
    let mut host = RunningHost::start(test_config(5.0), platform.clone()).await;
    activate(&platform, None).await;
    assert_eq!(platform.check_health(), Some(true));

    let mut client = TcpStream::connect(host.addr).await.unwrap();
    send(&mut client, &Message::signal(MessageKind::Connect)).await;

    let (client_id, message) = host.next_message().await;
    assert_eq!(message.kind, MessageKind::Connect);

    let spawn = Message::new(MessageKind::Spawn, b"{\"x\":1}".to_vec());
    host.registry.send(client_id, &spawn).unwrap();
    let mut buffer = Vec::new();
    assert_eq!(read_message(&mut client, &mut buffer).await, Some(spawn));

    host.signal_shutdown();
    assert_eq!(read_message(&mut client, &mut buffer).await, None);

    host.finish().await.unwrap();
    assert_eq!(platform.process_ending_calls(), 1);
    assert!(platform.is_destroyed());
}

#[tokio::test]
async fn game_messages_reach_the_inbox_in_order() {
    let platform = Arc::new(LocalPlatform::new());
    let mut host = RunningHost::start(test_config(5.0), platform.clone()).await;
    activate(&platform, None).await;

    let mut client = TcpStream::connect(host.addr).await.unwrap();
    send(&mut client, &Message::signal(MessageKind::Connect)).await;
    for step in 0u8..3 {
        send(&mut client, &Message::new(MessageKind::PositionUpdate, vec![step])).await;
    }

    let (connect_id, connect) = host.next_message().await;
    assert_eq!(connect.kind, MessageKind::Connect);
    for step in 0u8..3 {
        let (client_id, message) = host.next_message().await;
        assert_eq!(client_id, connect_id);
        assert_eq!(message, Message::new(MessageKind::PositionUpdate, vec![step]));
    }

    host.signal_shutdown();
    host.finish().await.unwrap();
}

#[tokio::test]
async fn malformed_frame_drops_only_the_offending_client() {
    let platform = Arc::new(LocalPlatform::new());
    let mut host = RunningHost::start(test_config(5.0), platform.clone()).await;
    activate(&platform, None).await;

    let mut good = TcpStream::connect(host.addr).await.unwrap();
    send(&mut good, &Message::signal(MessageKind::Connect)).await;
    let (good_id, _) = host.next_message().await;

    let mut bad = TcpStream::connect(host.addr).await.unwrap();
    bad.write_all(&[0, 0, 0, 0]).await.unwrap();
    let mut bad_buffer = Vec::new();
    assert_eq!(read_message(&mut bad, &mut bad_buffer).await, None);

    send(&mut good, &Message::new(MessageKind::GameEvent, b"still here".to_vec())).await;
    let (client_id, message) = host.next_message().await;
    assert_eq!(client_id, good_id);
    assert_eq!(message.kind, MessageKind::GameEvent);
    assert_eq!(host.registry.len(), 1);

    host.signal_shutdown();
    host.finish().await.unwrap();
}

#[tokio::test]
async fn platform_termination_stops_backfill_and_exits() {
    let platform = Arc::new(LocalPlatform::new());
    let host = RunningHost::start(test_config(5.0), platform.clone()).await;

    let matchmaker_data = format!(
        r#"{{"matchmakingConfigurationArn":"{CONFIG_ARN}","autoBackfillTicketId":"ticket-1"}}"#
    );
    activate(&platform, Some(matchmaker_data)).await;
    platform.terminate_process_locally().unwrap();

    host.finish().await.unwrap();
    assert_eq!(
        platform.backfill_stops(),
        vec![StopBackfillRequest {
            ticket_id: "ticket-1".to_string(),
            matchmaking_configuration_arn: CONFIG_ARN.to_string(),
            game_session_arn: SESSION_ID.to_string(),
        }]
    );
    assert_eq!(platform.process_ending_calls(), 1);
}

#[tokio::test]
async fn shutdown_before_any_session_still_reports_process_ending() {
    let platform = Arc::new(LocalPlatform::new());
    let mut host = RunningHost::start(test_config(5.0), platform.clone()).await;
    wait_until_ready(&platform).await;

    host.signal_shutdown();
    host.finish().await.unwrap();
    assert!(!platform.is_session_activated());
    assert_eq!(platform.process_ending_calls(), 1);
}

#[tokio::test]
async fn stalled_runtime_does_not_expire_the_wait_timer() {
    let platform = Arc::new(LocalPlatform::new());
    let mut config = test_config(1.0);
    config.server.max_tick_delta_ms = 50;
    let mut host = RunningHost::start(config, platform.clone()).await;
    activate(&platform, None).await;
    wait_until_activated(&platform).await;

    // Blocks the only runtime thread, so the host cannot tick meanwhile.
    std::thread::sleep(Duration::from_millis(1500));
    sleep(Duration::from_millis(200)).await;
    assert_eq!(platform.process_ending_calls(), 0);

    host.signal_shutdown();
    host.finish().await.unwrap();
    assert_eq!(platform.process_ending_calls(), 1);
}

#[tokio::test]
async fn connect_before_activation_starts_the_game() {
    let platform = Arc::new(LocalPlatform::new());
    let mut host = RunningHost::start(test_config(0.3), platform.clone()).await;
    wait_until_ready(&platform).await;

    let mut client = TcpStream::connect(host.addr).await.unwrap();
    send(&mut client, &Message::signal(MessageKind::Connect)).await;
    let (_, message) = host.next_message().await;
    assert_eq!(message.kind, MessageKind::Connect);

    activate(&platform, None).await;
    wait_until_activated(&platform).await;
    sleep(Duration::from_millis(600)).await;
    assert_eq!(platform.process_ending_calls(), 0);
    assert_eq!(host.registry.len(), 1);

    host.signal_shutdown();
    host.finish().await.unwrap();
    assert_eq!(platform.process_ending_calls(), 1);
}

struct Degraded;

impl HealthCheck for Degraded {
    fn is_healthy(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn host_reports_a_custom_health_check() {
    let platform = Arc::new(LocalPlatform::new());
    let host = GameHost::new(test_config(5.0), platform.clone(), Arc::new(NoopMetrics))
        .unwrap()
        .with_health_check(Arc::new(Degraded));
    let mut host = RunningHost::launch(host).await;
    wait_until_ready(&platform).await;

    assert_eq!(platform.check_health(), Some(false));

    host.signal_shutdown();
    host.finish().await.unwrap();
}

/// A platform agent that refuses the ready call.
struct RefusingPlatform;

impl OrchestrationPlatform for RefusingPlatform {
    fn init_sdk(&self) -> Result<(), PlatformCallError> {
        Ok(())
    }
    fn process_ready(&self, _params: ProcessParameters) -> Result<(), PlatformCallError> {
        Err(PlatformCallError::new("process_ready", "fleet is draining"))
    }
    fn activate_session(&self) -> Result<(), PlatformCallError> {
        Ok(())
    }
    fn process_ending(&self) -> Result<(), PlatformCallError> {
        Ok(())
    }
    fn destroy(&self) -> Result<(), PlatformCallError> {
        Ok(())
    }
    fn current_session_id(&self) -> Result<String, PlatformCallError> {
        Err(PlatformCallError::new("current_session_id", "no session"))
    }
    fn request_backfill_stop(&self, _request: &StopBackfillRequest) -> Result<(), PlatformCallError> {
        Ok(())
    }
}

#[tokio::test]
async fn refused_process_ready_aborts_startup() {
    let host = RunningHost::start(test_config(5.0), Arc::new(RefusingPlatform)).await;
    let err = host.finish().await.unwrap_err();
    assert!(matches!(
        err,
        ServerError::Platform(PlatformCallError { operation: "process_ready", .. })
    ));
}
