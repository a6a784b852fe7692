use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Level;
use url::Url;

use stagecast_client::{ClientConfig, StreamEvent, StreamingClient};
use stagecast_core::{ClientCommand, MediaKind, ParticipantId, Role, RoomId, ServerEvent, StreamInfo, Visibility};

use crate::utils::{MockCapture, MockHub};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub struct TestHarness {
    pub client: StreamingClient,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
    pub hub: Arc<MockHub>,
    pub commands: mpsc::UnboundedReceiver<ClientCommand>,
    pub capture: Arc<MockCapture>,
    pub participant_id: ParticipantId,
}

/// Spin up a client against an in-memory hub with no ICE servers, so
/// candidate gathering finishes on host candidates alone.
pub async fn spawn_client() -> TestHarness {
    init_tracing();

    let (hub, commands) = MockHub::new();
    let capture = MockCapture::new();
    let participant_id = ParticipantId::new();

    let mut config = ClientConfig::new(
        Url::parse("ws://hub.test/stream").expect("url"),
        "tester",
    );
    config.participant_id = participant_id.clone();
    config.ice_servers = vec![];

    let (client, events) = StreamingClient::connect_with(hub.transport(), config, capture.clone())
        .await
        .expect("client connect");

    TestHarness {
        client,
        events,
        hub,
        commands,
        capture,
        participant_id,
    }
}

pub fn test_stream(kind: MediaKind) -> StreamInfo {
    StreamInfo {
        title: "test stream".to_string(),
        description: "integration fixture".to_string(),
        category: "testing".to_string(),
        visibility: Visibility::Public,
        kind,
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
    // Safety bound only; must exceed the 60 s reconnect window so paused-time
    // tests can wait out the terminal Disconnected event.
    tokio::time::timeout(Duration::from_secs(90), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

pub async fn next_command(rx: &mut mpsc::UnboundedReceiver<ClientCommand>) -> ClientCommand {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for command")
        .expect("command channel closed")
}

/// Next command that is not a trickled candidate relay. Negotiation tests
/// care about offers and answers; candidates arrive interleaved.
pub async fn next_signal_command(rx: &mut mpsc::UnboundedReceiver<ClientCommand>) -> ClientCommand {
    loop {
        match next_command(rx).await {
            ClientCommand::SendCandidateToProducer { .. }
            | ClientCommand::SendCandidateToConsumer { .. } => continue,
            other => return other,
        }
    }
}

/// Assert that no offer goes out within `wait`, ignoring candidate relays.
pub async fn assert_no_offer(rx: &mut mpsc::UnboundedReceiver<ClientCommand>, wait: Duration) {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(ClientCommand::SendOfferToProducer { .. })) => {
                panic!("unexpected renegotiation offer")
            }
            Ok(Some(_)) => continue,
            Ok(None) => panic!("command channel closed"),
            Err(_) => return,
        }
    }
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Start a stream and run the handshake through to an active host session.
pub async fn establish_host(h: &mut TestHarness, room: &str) {
    h.client
        .start_stream(test_stream(MediaKind::Video))
        .await
        .expect("start stream");
    let cmd = next_command(&mut h.commands).await;
    assert!(matches!(cmd, ClientCommand::StartStream { .. }));

    h.hub.send_event(ServerEvent::StreamStarted {
        room_id: RoomId::from(room),
        stream: test_stream(MediaKind::Video),
    });
    let event = next_event(&mut h.events).await;
    assert!(matches!(event, StreamEvent::StreamStarted { .. }));
    wait_until(|| h.client.current_room().is_some()).await;
}

/// Join an existing stream and run the handshake through to a session with
/// the given role.
pub async fn establish_member(h: &mut TestHarness, room: &str, role: Role) {
    h.client
        .join_stream(RoomId::from(room))
        .await
        .expect("join stream");
    let cmd = next_command(&mut h.commands).await;
    assert!(matches!(cmd, ClientCommand::JoinStream { .. }));

    h.hub.send_event(ServerEvent::JoinedStream {
        room_id: RoomId::from(room),
        role,
        stream: test_stream(MediaKind::Video),
    });
    let event = next_event(&mut h.events).await;
    assert!(matches!(event, StreamEvent::JoinedStream { .. }));
    wait_until(|| h.client.current_room().is_some()).await;
}
