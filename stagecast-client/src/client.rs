use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::error::Error;
use crate::events::StreamEvent;
use crate::media::{CaptureConfig, MediaCapture};
use crate::orchestrator::{Identity, Intent, Orchestrator};
use crate::peer::{LinkDirection, NegotiationState};
use crate::signaling::{SignalTransport, SignalingChannel, WsTransport};
use stagecast_core::{
    IceServerConfig, MediaKind, ParticipantId, ProducerId, Role, RoomId, StreamInfo,
};

/// Connection settings for a [`StreamingClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub hub_url: Url,
    pub access_token: Option<String>,
    pub participant_id: ParticipantId,
    pub username: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub capture: CaptureConfig,
}

impl ClientConfig {
    pub fn new(hub_url: Url, username: impl Into<String>) -> Self {
        Self {
            hub_url,
            access_token: None,
            participant_id: ParticipantId::new(),
            username: username.into(),
            ice_servers: default_ice_servers(),
            capture: CaptureConfig::default(),
        }
    }
}

fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig {
        urls: vec![
            "stun:stun.l.google.com:19302".to_string(),
            "stun:stun1.l.google.com:19302".to_string(),
        ],
        username: None,
        credential: None,
    }]
}

/// Read-only view of one peer link, as of the last orchestrator iteration.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub counterpart: ParticipantId,
    pub direction: LinkDirection,
    pub state: NegotiationState,
    pub kinds: Vec<MediaKind>,
}

/// State mirror the orchestrator refreshes after every processed event, so
/// the handle can answer queries without a round trip into the loop.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub room: Option<RoomId>,
    pub role: Option<Role>,
    pub producer_kinds: Vec<MediaKind>,
    pub links: Vec<LinkInfo>,
}

/// Handle to a running streaming session worker.
///
/// Cloning is cheap; all clones drive the same orchestrator. Dropping the
/// last clone shuts the worker down and tears the session down with it.
#[derive(Clone)]
pub struct StreamingClient {
    intent_tx: mpsc::Sender<Intent>,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl StreamingClient {
    /// Connect to the hub over WebSocket and spawn the session worker.
    /// Returns the handle plus the receiver of session events.
    pub async fn connect(
        config: ClientConfig,
        capture: Arc<dyn MediaCapture>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StreamEvent>), Error> {
        let transport = Arc::new(WsTransport::new(
            config.hub_url.clone(),
            config.access_token.clone(),
        ));
        Self::connect_with(transport, config, capture).await
    }

    /// Connect through a caller-supplied transport. Tests drive the client
    /// with an in-memory transport through this entry point.
    pub async fn connect_with(
        transport: Arc<dyn SignalTransport>,
        config: ClientConfig,
        capture: Arc<dyn MediaCapture>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StreamEvent>), Error> {
        let (channel_tx, channel_rx) = mpsc::channel(256);
        let channel = SignalingChannel::connect(transport, channel_tx).await?;

        let (intent_tx, intent_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(Mutex::new(Snapshot::default()));

        let orchestrator = Orchestrator::new(
            channel,
            capture,
            Identity {
                participant_id: config.participant_id,
                username: config.username,
            },
            config.ice_servers,
            config.capture,
            intent_rx,
            channel_rx,
            event_tx,
            Arc::clone(&snapshot),
        );
        tokio::spawn(orchestrator.run());

        Ok((
            Self {
                intent_tx,
                snapshot,
            },
            event_rx,
        ))
    }

    async fn send<F>(&self, make: F) -> Result<(), Error>
    where
        F: FnOnce(oneshot::Sender<Result<(), Error>>) -> Intent,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.intent_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| Error::Closed)?;
        reply_rx.await.map_err(|_| Error::Closed)?
    }

    /// Start broadcasting a new stream as host.
    pub async fn start_stream(&self, stream: StreamInfo) -> Result<(), Error> {
        self.send(|reply| Intent::StartStream { stream, reply }).await
    }

    /// Join an existing stream as viewer.
    pub async fn join_stream(&self, room_id: RoomId) -> Result<(), Error> {
        self.send(|reply| Intent::JoinStream { room_id, reply }).await
    }

    /// Capture and announce one media kind.
    pub async fn produce(&self, kind: MediaKind) -> Result<(), Error> {
        self.send(|reply| Intent::Produce { kind, reply }).await
    }

    /// Announce the requested kinds one after another. Stops at the first
    /// failure so a missing camera does not silence the microphone too.
    pub async fn start_producing(&self, audio: bool, video: bool) -> Result<(), Error> {
        if audio {
            self.produce(MediaKind::Audio).await?;
        }
        if video {
            self.produce(MediaKind::Video).await?;
        }
        Ok(())
    }

    /// Ask the hub for a remote producer's media. The resulting tracks
    /// arrive as [`StreamEvent::RemoteStream`].
    pub async fn consume(&self, producer_id: ProducerId) -> Result<(), Error> {
        self.send(|reply| Intent::Consume { producer_id, reply }).await
    }

    pub async fn pause_producer(&self, producer_id: ProducerId) -> Result<(), Error> {
        self.send(|reply| Intent::PauseProducer { producer_id, reply })
            .await
    }

    pub async fn resume_producer(&self, producer_id: ProducerId) -> Result<(), Error> {
        self.send(|reply| Intent::ResumeProducer { producer_id, reply })
            .await
    }

    pub async fn close_producer(&self, producer_id: ProducerId) -> Result<(), Error> {
        self.send(|reply| Intent::CloseProducer { producer_id, reply })
            .await
    }

    /// Post a chat message into the room.
    pub async fn send_message(&self, body: impl Into<String>) -> Result<(), Error> {
        let body = body.into();
        self.send(|reply| Intent::SendMessage { body, reply }).await
    }

    /// Leave the room. Local media and links are released even when the hub
    /// cannot be reached.
    pub async fn leave_stream(&self) -> Result<(), Error> {
        self.send(|reply| Intent::Leave { reply }).await
    }

    /// End the broadcast for everyone. Host only.
    pub async fn end_stream(&self) -> Result<(), Error> {
        self.send(|reply| Intent::End { reply }).await
    }

    pub async fn invite_co_host(&self, participant_id: ParticipantId) -> Result<(), Error> {
        self.send(|reply| Intent::InviteCoHost {
            participant_id,
            reply,
        })
        .await
    }

    pub async fn accept_co_host(&self) -> Result<(), Error> {
        self.send(|reply| Intent::AcceptCoHost { reply }).await
    }

    pub async fn reject_co_host(&self) -> Result<(), Error> {
        self.send(|reply| Intent::RejectCoHost { reply }).await
    }

    pub async fn remove_co_host(&self, participant_id: ParticipantId) -> Result<(), Error> {
        self.send(|reply| Intent::RemoveCoHost {
            participant_id,
            reply,
        })
        .await
    }

    pub async fn leave_co_host(&self) -> Result<(), Error> {
        self.send(|reply| Intent::LeaveCoHost { reply }).await
    }

    pub async fn remove_user(&self, participant_id: ParticipantId) -> Result<(), Error> {
        self.send(|reply| Intent::RemoveUser {
            participant_id,
            reply,
        })
        .await
    }

    pub async fn block_user(&self, participant_id: ParticipantId) -> Result<(), Error> {
        self.send(|reply| Intent::BlockUser {
            participant_id,
            reply,
        })
        .await
    }

    // ---- snapshot accessors --------------------------------------------

    fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn current_room(&self) -> Option<RoomId> {
        self.snapshot().room
    }

    pub fn current_role(&self) -> Option<Role> {
        self.snapshot().role
    }

    pub fn producer_kinds(&self) -> Vec<MediaKind> {
        self.snapshot().producer_kinds
    }

    pub fn producer_count(&self) -> usize {
        self.snapshot().producer_kinds.len()
    }

    pub fn links(&self) -> Vec<LinkInfo> {
        self.snapshot().links
    }
}
