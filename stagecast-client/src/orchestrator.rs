use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::{LinkInfo, Snapshot};
use crate::error::Error;
use crate::events::{SessionEndReason, StreamEvent};
use crate::media::{CaptureConfig, MediaCapture, ProducerRegistry, RemoteSource, RemoteSourceRegistry, RemoteStreams};
use crate::peer::{LinkDirection, NegotiationState, PeerEvent, PeerLink, shape_answer};
use crate::roles::RoleOverlay;
use crate::session::RoomSession;
use crate::signaling::{ChannelEvent, SignalingChannel};
use stagecast_core::{
    CandidateInit, ClientCommand, ConsumerId, IceServerConfig, MediaKind, ParticipantId,
    ProducerId, Role, RoomId, SdpType, ServerEvent, SessionDescription, StreamInfo,
};

type Reply = oneshot::Sender<Result<(), Error>>;

/// Who this client is toward the hub.
pub(crate) struct Identity {
    pub participant_id: ParticipantId,
    pub username: String,
}

/// Requests from the [`StreamingClient`](crate::client::StreamingClient)
/// handle into the orchestrator loop.
pub(crate) enum Intent {
    StartStream { stream: StreamInfo, reply: Reply },
    JoinStream { room_id: RoomId, reply: Reply },
    Produce { kind: MediaKind, reply: Reply },
    Consume { producer_id: ProducerId, reply: Reply },
    PauseProducer { producer_id: ProducerId, reply: Reply },
    ResumeProducer { producer_id: ProducerId, reply: Reply },
    CloseProducer { producer_id: ProducerId, reply: Reply },
    SendMessage { body: String, reply: Reply },
    Leave { reply: Reply },
    End { reply: Reply },
    InviteCoHost { participant_id: ParticipantId, reply: Reply },
    AcceptCoHost { reply: Reply },
    RejectCoHost { reply: Reply },
    RemoveCoHost { participant_id: ParticipantId, reply: Reply },
    LeaveCoHost { reply: Reply },
    RemoveUser { participant_id: ParticipantId, reply: Reply },
    BlockUser { participant_id: ParticipantId, reply: Reply },
}

struct ConsumerEntry {
    producer_id: ProducerId,
    counterpart: ParticipantId,
}

/// Single-task owner of all session state. Everything mutable lives here
/// and is driven by one `select!` loop over intents, hub events and peer
/// callbacks, so no per-field locking is needed.
pub(crate) struct Orchestrator {
    channel: SignalingChannel,
    capture: Arc<dyn MediaCapture>,
    identity: Identity,
    ice_servers: Vec<IceServerConfig>,
    capture_config: CaptureConfig,

    session: Option<RoomSession>,
    pending_join: Option<RoomId>,

    // Links to counterparts we consume from, keyed by producing participant.
    consumer_links: HashMap<ParticipantId, PeerLink>,
    // Links to counterparts consuming from us, keyed by consuming participant.
    responder_links: HashMap<ParticipantId, PeerLink>,

    producers: ProducerRegistry,
    consumers: HashMap<ConsumerId, ConsumerEntry>,
    remote_sources: RemoteSourceRegistry,
    remote_streams: RemoteStreams,
    roles: RoleOverlay,

    intent_rx: mpsc::Receiver<Intent>,
    channel_rx: mpsc::Receiver<ChannelEvent>,
    peer_tx: mpsc::Sender<PeerEvent>,
    peer_rx: mpsc::Receiver<PeerEvent>,
    event_tx: mpsc::UnboundedSender<StreamEvent>,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        channel: SignalingChannel,
        capture: Arc<dyn MediaCapture>,
        identity: Identity,
        ice_servers: Vec<IceServerConfig>,
        capture_config: CaptureConfig,
        intent_rx: mpsc::Receiver<Intent>,
        channel_rx: mpsc::Receiver<ChannelEvent>,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        snapshot: Arc<Mutex<Snapshot>>,
    ) -> Self {
        let (peer_tx, peer_rx) = mpsc::channel(256);
        Self {
            channel,
            capture,
            identity,
            ice_servers,
            capture_config,
            session: None,
            pending_join: None,
            consumer_links: HashMap::new(),
            responder_links: HashMap::new(),
            producers: ProducerRegistry::new(),
            consumers: HashMap::new(),
            remote_sources: RemoteSourceRegistry::new(),
            remote_streams: RemoteStreams::new(),
            roles: RoleOverlay::new(),
            intent_rx,
            channel_rx,
            peer_tx,
            peer_rx,
            event_tx,
            snapshot,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                intent = self.intent_rx.recv() => match intent {
                    Some(intent) => self.handle_intent(intent).await,
                    None => {
                        debug!("client handle dropped, shutting down orchestrator");
                        self.teardown(SessionEndReason::Left).await;
                        break;
                    }
                },

                event = self.channel_rx.recv() => match event {
                    Some(event) => self.handle_channel_event(event).await,
                    None => {
                        self.teardown(SessionEndReason::ChannelLost).await;
                        break;
                    }
                },

                peer = self.peer_rx.recv() => {
                    // peer_tx is held by self, so this arm never yields None
                    if let Some(peer) = peer {
                        self.handle_peer_event(peer).await;
                    }
                },
            }

            self.refresh_snapshot();
        }
        self.refresh_snapshot();
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.event_tx.send(event);
    }

    fn room_id(&self) -> Option<RoomId> {
        self.session.as_ref().map(|s| s.room_id.clone())
    }

    // ---- intents -------------------------------------------------------

    async fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::StartStream { stream, reply } => {
                let result = self.start_stream(stream).await;
                let _ = reply.send(result);
            }
            Intent::JoinStream { room_id, reply } => {
                let result = self.join_stream(room_id).await;
                let _ = reply.send(result);
            }
            Intent::Produce { kind, reply } => {
                let result = self.produce(kind).await;
                let _ = reply.send(result);
            }
            Intent::Consume { producer_id, reply } => {
                let result = self.consume(producer_id).await;
                let _ = reply.send(result);
            }
            Intent::PauseProducer { producer_id, reply } => {
                let result = self.set_producer_paused(producer_id, true).await;
                let _ = reply.send(result);
            }
            Intent::ResumeProducer { producer_id, reply } => {
                let result = self.set_producer_paused(producer_id, false).await;
                let _ = reply.send(result);
            }
            Intent::CloseProducer { producer_id, reply } => {
                let result = self.close_producer(producer_id).await;
                let _ = reply.send(result);
            }
            Intent::SendMessage { body, reply } => {
                let result = match self.room_id() {
                    Some(room_id) => self.channel.invoke(ClientCommand::SendMessage { room_id, body }).await,
                    None => Err(Error::Session("no active session".to_string())),
                };
                let _ = reply.send(result);
            }
            Intent::Leave { reply } => {
                let result = self.leave().await;
                let _ = reply.send(result);
            }
            Intent::End { reply } => {
                let result = self.end().await;
                let _ = reply.send(result);
            }
            Intent::InviteCoHost { participant_id, reply } => {
                let result = self.host_command(|room_id| ClientCommand::InviteCoHost {
                    room_id,
                    participant_id: participant_id.clone(),
                })
                .await;
                if result.is_ok() {
                    self.roles.mark_invited(participant_id);
                }
                let _ = reply.send(result);
            }
            Intent::AcceptCoHost { reply } => {
                let result = self.session_command(|room_id| ClientCommand::AcceptCoHost { room_id }).await;
                let _ = reply.send(result);
            }
            Intent::RejectCoHost { reply } => {
                let result = self.session_command(|room_id| ClientCommand::RejectCoHost { room_id }).await;
                let _ = reply.send(result);
            }
            Intent::RemoveCoHost { participant_id, reply } => {
                let result = self.host_command(|room_id| ClientCommand::RemoveCoHost {
                    room_id,
                    participant_id: participant_id.clone(),
                })
                .await;
                let _ = reply.send(result);
            }
            Intent::LeaveCoHost { reply } => {
                let result = self.session_command(|room_id| ClientCommand::LeaveCoHost { room_id }).await;
                let _ = reply.send(result);
            }
            Intent::RemoveUser { participant_id, reply } => {
                let result = self.host_command(|room_id| ClientCommand::RemoveUser {
                    room_id,
                    participant_id: participant_id.clone(),
                })
                .await;
                let _ = reply.send(result);
            }
            Intent::BlockUser { participant_id, reply } => {
                let result = self.host_command(|room_id| ClientCommand::BlockUser {
                    room_id,
                    participant_id: participant_id.clone(),
                })
                .await;
                let _ = reply.send(result);
            }
        }
    }

    async fn session_command<F>(&self, command: F) -> Result<(), Error>
    where
        F: FnOnce(RoomId) -> ClientCommand,
    {
        match self.room_id() {
            Some(room_id) => self.channel.invoke(command(room_id)).await,
            None => Err(Error::Session("no active session".to_string())),
        }
    }

    async fn host_command<F>(&self, command: F) -> Result<(), Error>
    where
        F: FnOnce(RoomId) -> ClientCommand,
    {
        match &self.session {
            Some(session) if session.is_host() => {
                self.channel.invoke(command(session.room_id.clone())).await
            }
            Some(_) => Err(Error::Session("only the host may do this".to_string())),
            None => Err(Error::Session("no active session".to_string())),
        }
    }

    async fn start_stream(&mut self, stream: StreamInfo) -> Result<(), Error> {
        if self.session.is_some() || self.pending_join.is_some() {
            return Err(Error::Session("a session is already active".to_string()));
        }
        self.channel
            .invoke(ClientCommand::StartStream {
                participant_id: self.identity.participant_id.clone(),
                username: self.identity.username.clone(),
                stream,
            })
            .await
    }

    async fn join_stream(&mut self, room_id: RoomId) -> Result<(), Error> {
        if self.session.is_some() || self.pending_join.is_some() {
            return Err(Error::Session("a session is already active".to_string()));
        }
        if self.roles.is_room_blocked(&room_id) {
            return Err(Error::AccessDenied { room: room_id });
        }

        self.pending_join = Some(room_id.clone());
        let result = self
            .channel
            .invoke(ClientCommand::JoinStream {
                room_id: room_id.clone(),
                participant_id: self.identity.participant_id.clone(),
                username: self.identity.username.clone(),
            })
            .await;

        if result.is_err() {
            self.pending_join = None;
            if self.roles.is_room_blocked(&room_id) {
                return Err(Error::AccessDenied { room: room_id });
            }
        }
        result
    }

    async fn produce(&mut self, kind: MediaKind) -> Result<(), Error> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::Session("no active session".to_string()))?;
        if session.role == Role::Viewer {
            return Err(Error::Produce {
                kind,
                reason: "viewers cannot produce media".to_string(),
            });
        }
        if self.producers.is_active(kind) {
            return Err(Error::Produce {
                kind,
                reason: "a producer of this kind is already active".to_string(),
            });
        }
        let room_id = session.room_id.clone();

        let track = self
            .capture
            .open(kind, &self.capture_config)
            .await
            .map_err(|e| Error::Produce {
                kind,
                reason: e.to_string(),
            })?;
        self.producers.insert(kind, track);

        match self
            .channel
            .invoke(ClientCommand::ProduceMedia { room_id, kind })
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                self.producers.remove_kind(kind);
                self.capture.close(kind).await;
                Err(Error::Produce {
                    kind,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn consume(&mut self, producer_id: ProducerId) -> Result<(), Error> {
        let room_id = self
            .room_id()
            .ok_or_else(|| Error::Session("no active session".to_string()))?;
        if self.remote_sources.get(&producer_id).is_none() {
            return Err(Error::Consume(format!("unknown producer {producer_id}")));
        }

        self.channel
            .invoke(ClientCommand::ConsumeMedia {
                room_id,
                producer_id,
            })
            .await
    }

    async fn set_producer_paused(
        &mut self,
        producer_id: ProducerId,
        paused: bool,
    ) -> Result<(), Error> {
        let room_id = self
            .room_id()
            .ok_or_else(|| Error::Session("no active session".to_string()))?;
        if self.producers.kind_of(&producer_id).is_none() {
            return Err(Error::Session(format!("unknown producer {producer_id}")));
        }

        let command = if paused {
            ClientCommand::PauseProducer {
                room_id,
                producer_id: producer_id.clone(),
            }
        } else {
            ClientCommand::ResumeProducer {
                room_id,
                producer_id: producer_id.clone(),
            }
        };
        self.channel.invoke(command).await?;
        self.producers.set_paused(&producer_id, paused);
        Ok(())
    }

    async fn close_producer(&mut self, producer_id: ProducerId) -> Result<(), Error> {
        let room_id = self
            .room_id()
            .ok_or_else(|| Error::Session("no active session".to_string()))?;
        if self.producers.kind_of(&producer_id).is_none() {
            return Err(Error::Session(format!("unknown producer {producer_id}")));
        }

        self.channel
            .invoke(ClientCommand::CloseProducer {
                room_id,
                producer_id: producer_id.clone(),
            })
            .await?;

        if let Some((kind, entry)) = self.producers.remove(&producer_id) {
            entry.track.set_enabled(false);
            self.capture.close(kind).await;
        }
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), Error> {
        let room_id = self
            .room_id()
            .ok_or_else(|| Error::Session("no active session".to_string()))?;

        if let Err(e) = self.channel.invoke(ClientCommand::LeaveStream { room_id }).await {
            // local teardown happens regardless of whether the hub heard us
            warn!("leave notification failed: {e}");
        }
        self.teardown(SessionEndReason::Left).await;
        Ok(())
    }

    async fn end(&mut self) -> Result<(), Error> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::Session("no active session".to_string()))?;
        if !session.is_host() {
            return Err(Error::Session("only the host may end the stream".to_string()));
        }
        let room_id = session.room_id.clone();

        self.channel.invoke(ClientCommand::EndStream { room_id }).await?;
        self.teardown(SessionEndReason::Ended).await;
        Ok(())
    }

    // ---- hub events ----------------------------------------------------

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Event(event) => self.handle_server_event(event).await,
            ChannelEvent::Reconnecting => {
                // Peer links negotiated over the lost connection are dead;
                // the application rejoins after Reconnected.
                self.emit(StreamEvent::Reconnecting);
                self.teardown(SessionEndReason::ChannelLost).await;
            }
            ChannelEvent::Reconnected => self.emit(StreamEvent::Reconnected),
            ChannelEvent::Disconnected => {
                self.teardown(SessionEndReason::ChannelLost).await;
                self.emit(StreamEvent::Disconnected);
            }
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::StreamStarted { room_id, stream } => {
                self.session = Some(RoomSession::new(room_id.clone(), Role::Host, stream.kind));
                info!("stream started in room {room_id}");
                self.emit(StreamEvent::StreamStarted { room_id });
            }

            ServerEvent::JoinedStream { room_id, role, stream } => {
                self.pending_join = None;
                self.session = Some(RoomSession::new(room_id.clone(), role, stream.kind));
                info!("joined room {room_id} as {role}");
                self.emit(StreamEvent::JoinedStream { room_id, role });
            }

            ServerEvent::ProducerCreated { producer_id, kind } => {
                debug!("producer {producer_id} confirmed for {kind}");
                self.producers.assign_id(kind, producer_id);
            }

            ServerEvent::NewProducer {
                producer_id,
                participant_id,
                kind,
                display_name,
            } => {
                if participant_id == self.identity.participant_id {
                    return;
                }
                let display_name = display_name.unwrap_or_default();
                self.remote_sources.insert(RemoteSource {
                    producer_id: producer_id.clone(),
                    counterpart: participant_id.clone(),
                    kind,
                    display_name: display_name.clone(),
                });
                self.emit(StreamEvent::ProducerAvailable {
                    producer_id,
                    participant_id,
                    kind,
                    display_name,
                });
            }

            ServerEvent::ConsumerCreated {
                consumer_id,
                producer_id,
                producer_participant,
                kind,
            } => {
                self.consumers.insert(
                    consumer_id,
                    ConsumerEntry {
                        producer_id,
                        counterpart: producer_participant.clone(),
                    },
                );
                self.negotiate_consume(producer_participant, kind).await;
            }

            ServerEvent::ProducerPaused { producer_id } => {
                self.emit(StreamEvent::ProducerPaused { producer_id });
            }

            ServerEvent::ProducerResumed { producer_id } => {
                self.emit(StreamEvent::ProducerResumed { producer_id });
            }

            ServerEvent::ProducerClosed { producer_id, .. } => {
                self.consumers.retain(|_, e| e.producer_id != producer_id);
                if let Some(source) = self.remote_sources.remove(&producer_id) {
                    // drop the link only when no other source of that
                    // counterpart is still consumed over it
                    if !self.remote_sources.has_for(&source.counterpart) {
                        self.drop_consumer_link(&source.counterpart).await;
                    }
                }
                self.emit(StreamEvent::ProducerClosed { producer_id });
            }

            ServerEvent::UserJoined {
                participant_id,
                username,
                role,
            } => {
                self.emit(StreamEvent::UserJoined {
                    participant_id,
                    display_name: username,
                    role,
                });
            }

            ServerEvent::UserLeft { participant_id } => {
                if self.roles.mark_left(participant_id.clone()) {
                    self.purge_counterpart(&participant_id).await;
                }
                if let Some(mut link) = self.responder_links.remove(&participant_id) {
                    let _ = link.close().await;
                }
                self.emit(StreamEvent::UserLeft { participant_id });
            }

            ServerEvent::MessageReceived {
                sender_id,
                username,
                body,
                ..
            } => {
                self.emit(StreamEvent::MessageReceived {
                    sender: sender_id,
                    display_name: username,
                    body,
                });
            }

            ServerEvent::StreamEnded { .. } => {
                self.teardown(SessionEndReason::Ended).await;
            }

            ServerEvent::CoHostInvited { participant_id } => {
                if participant_id == self.identity.participant_id {
                    self.emit(StreamEvent::CoHostInvited { participant_id });
                } else {
                    self.roles.mark_invited(participant_id);
                }
            }

            ServerEvent::CoHostAdded { participant_id, .. } => {
                if participant_id == self.identity.participant_id {
                    if let Some(session) = self.session.as_mut() {
                        session.role = Role::CoHost;
                    }
                } else {
                    self.roles.mark_co_host(participant_id.clone());
                }
                self.emit(StreamEvent::CoHostAdded { participant_id });
            }

            ServerEvent::CoHostRemoved { participant_id } => {
                let participant_id = self.on_co_host_gone(participant_id).await;
                self.emit(StreamEvent::CoHostRemoved { participant_id });
            }

            ServerEvent::CoHostLeft { participant_id } => {
                let participant_id = self.on_co_host_gone(participant_id).await;
                self.emit(StreamEvent::CoHostLeft { participant_id });
            }

            ServerEvent::CoHostMediaRemoved { participant_id, kind } => {
                if participant_id == self.identity.participant_id {
                    if let Some(entry) = self.producers.remove_kind(kind) {
                        entry.track.set_enabled(false);
                        self.capture.close(kind).await;
                    }
                } else {
                    self.remote_sources.remove_kind_for(&participant_id, kind);
                }
            }

            ServerEvent::UserRemoved { participant_id } => {
                if participant_id == self.identity.participant_id {
                    self.teardown(SessionEndReason::Removed).await;
                } else {
                    if self.roles.mark_removed(participant_id.clone()) {
                        self.purge_counterpart(&participant_id).await;
                    }
                    if let Some(mut link) = self.responder_links.remove(&participant_id) {
                        let _ = link.close().await;
                    }
                    self.emit(StreamEvent::UserRemoved { participant_id });
                }
            }

            ServerEvent::UserBlocked { participant_id, room_id } => {
                if participant_id == self.identity.participant_id {
                    self.roles.mark_blocked(participant_id, room_id);
                    self.teardown(SessionEndReason::Blocked).await;
                } else {
                    if self
                        .roles
                        .mark_blocked(participant_id.clone(), room_id.clone())
                    {
                        self.purge_counterpart(&participant_id).await;
                    }
                    if let Some(mut link) = self.responder_links.remove(&participant_id) {
                        let _ = link.close().await;
                    }
                    self.emit(StreamEvent::UserBlocked {
                        participant_id,
                        room_id,
                    });
                }
            }

            ServerEvent::Error { message, code } => {
                if let Some(room_id) = self.pending_join.take() {
                    self.emit(StreamEvent::AccessDenied { room_id, message });
                } else {
                    self.emit(StreamEvent::HubError { message, code });
                }
            }

            ServerEvent::OfferFromConsumer { consumer_id, offer } => {
                self.respond_to_offer(consumer_id, offer).await;
            }

            ServerEvent::AnswerFromProducer {
                producer_participant,
                answer,
            } => {
                let result = match self.consumer_links.get_mut(&producer_participant) {
                    Some(link) => link.apply_remote_answer(&answer.sdp).await,
                    None => {
                        warn!("answer from {producer_participant} without a link");
                        return;
                    }
                };
                if let Err(e) = result {
                    warn!("applying answer from {producer_participant} failed: {e}");
                    self.emit(StreamEvent::ConsumeFailed {
                        counterpart: producer_participant,
                        reason: e.to_string(),
                    });
                }
            }

            ServerEvent::CandidateFromConsumer {
                consumer_id,
                candidate,
            } => {
                match self.responder_links.get_mut(&consumer_id) {
                    Some(link) => link.handle_remote_candidate(candidate).await,
                    None => warn!("candidate from unknown consumer {consumer_id}"),
                }
            }

            ServerEvent::CandidateFromProducer {
                producer_participant,
                candidate,
            } => {
                match self.consumer_links.get_mut(&producer_participant) {
                    Some(link) => link.handle_remote_candidate(candidate).await,
                    None => warn!("candidate from unknown producer {producer_participant}"),
                }
            }

            // acks are consumed inside the channel worker
            ServerEvent::Ack { id, .. } => debug!("stray ack {id}"),
        }
    }

    // ---- negotiation ---------------------------------------------------

    /// Consumer side: make sure a link to `counterpart` exists and, when the
    /// link is quiescent, send a fresh offer covering both media kinds.
    /// While an exchange is in flight the new kind rides along once the
    /// counterpart re-offers or the next negotiation round starts.
    async fn negotiate_consume(&mut self, counterpart: ParticipantId, kind: MediaKind) {
        if self
            .consumer_links
            .get(&counterpart)
            .map(PeerLink::is_closed)
            .unwrap_or(false)
        {
            self.consumer_links.remove(&counterpart);
        }

        if !self.consumer_links.contains_key(&counterpart) {
            match PeerLink::new(
                counterpart.clone(),
                LinkDirection::FromProducer,
                &self.ice_servers,
                self.peer_tx.clone(),
            )
            .await
            {
                Ok(link) => {
                    self.consumer_links.insert(counterpart.clone(), link);
                }
                Err(e) => {
                    warn!("creating link to {counterpart} failed: {e}");
                    self.emit(StreamEvent::ConsumeFailed {
                        counterpart,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }

        let Some(room_id) = self.room_id() else { return };

        let offer = match self.build_consume_offer(&counterpart, kind).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!("consume negotiation with {counterpart} failed: {e}");
                self.emit(StreamEvent::ConsumeFailed {
                    counterpart,
                    reason: e.to_string(),
                });
                return;
            }
        };

        if let Some(sdp) = offer {
            let send = self.channel.notify(ClientCommand::SendOfferToProducer {
                room_id,
                producer_participant: counterpart.clone(),
                offer: SessionDescription {
                    kind: SdpType::Offer,
                    sdp,
                },
            });
            if let Err(e) = send {
                warn!("sending offer to {counterpart} failed: {e}");
                self.emit(StreamEvent::ConsumeFailed {
                    counterpart,
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn build_consume_offer(
        &mut self,
        counterpart: &ParticipantId,
        kind: MediaKind,
    ) -> Result<Option<String>> {
        let link = self
            .consumer_links
            .get_mut(counterpart)
            .context("consumer link vanished")?;
        link.mark_kind(kind);
        link.ensure_recv(kind).await?;

        if !matches!(link.state(), NegotiationState::New | NegotiationState::Stable) {
            debug!("link to {counterpart} mid-negotiation, deferring offer");
            return Ok(None);
        }

        // offer both kinds up front so a later producer of the other kind
        // renegotiates instead of opening a second link
        link.ensure_recv(MediaKind::Audio).await?;
        link.ensure_recv(MediaKind::Video).await?;
        let sdp = link.create_offer_bounded().await?;
        Ok(Some(sdp))
    }

    /// Producer side: answer a consumer's offer, attaching every local track
    /// and shaping the audio section before it goes out.
    async fn respond_to_offer(&mut self, consumer: ParticipantId, offer: SessionDescription) {
        let Some(room_id) = self.room_id() else {
            warn!("offer from {consumer} outside a session");
            return;
        };

        if self
            .responder_links
            .get(&consumer)
            .map(PeerLink::is_closed)
            .unwrap_or(false)
        {
            self.responder_links.remove(&consumer);
        }

        if !self.responder_links.contains_key(&consumer) {
            match PeerLink::new(
                consumer.clone(),
                LinkDirection::ToConsumer,
                &self.ice_servers,
                self.peer_tx.clone(),
            )
            .await
            {
                Ok(link) => {
                    self.responder_links.insert(consumer.clone(), link);
                }
                Err(e) => {
                    warn!("creating responder link to {consumer} failed: {e}");
                    return;
                }
            }
        }

        let tracks = self.producers.active_tracks();
        if tracks.is_empty() {
            warn!("answering {consumer} without any local producer");
            self.emit(StreamEvent::NoLocalMedia {
                consumer: consumer.clone(),
            });
        }

        let answer = async {
            let link = self
                .responder_links
                .get_mut(&consumer)
                .context("responder link vanished")?;
            for track in &tracks {
                link.attach_local(track).await?;
            }
            link.apply_remote_offer(&offer.sdp).await?;
            link.create_answer_bounded(|sdp| shape_answer(sdp)).await
        }
        .await;

        match answer {
            Ok(sdp) => {
                let send = self.channel.notify(ClientCommand::SendAnswerToConsumer {
                    room_id,
                    consumer_id: consumer.clone(),
                    answer: SessionDescription {
                        kind: SdpType::Answer,
                        sdp,
                    },
                });
                if let Err(e) = send {
                    warn!("sending answer to {consumer} failed: {e}");
                }
            }
            Err(e) => warn!("answering offer from {consumer} failed: {e}"),
        }
    }

    // ---- peer events ---------------------------------------------------

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::CandidateGenerated {
                counterpart,
                direction,
                candidate,
            } => self.relay_candidate(counterpart, direction, candidate),

            PeerEvent::TrackReceived {
                counterpart,
                kind,
                track,
            } => {
                if let Some(stream) = self.remote_streams.attach(&counterpart, kind, track) {
                    self.emit(StreamEvent::RemoteStream {
                        counterpart,
                        kind,
                        stream,
                    });
                }
            }

            PeerEvent::LinkFailed {
                counterpart,
                direction,
            } => {
                warn!("link to {counterpart} failed ({direction:?})");
                match direction {
                    LinkDirection::FromProducer => {
                        self.drop_consumer_link(&counterpart).await;
                        self.emit(StreamEvent::ConsumeFailed {
                            counterpart,
                            reason: "peer connection failed".to_string(),
                        });
                    }
                    LinkDirection::ToConsumer => {
                        if let Some(mut link) = self.responder_links.remove(&counterpart) {
                            let _ = link.close().await;
                        }
                    }
                }
            }
        }
    }

    fn relay_candidate(
        &mut self,
        counterpart: ParticipantId,
        direction: LinkDirection,
        candidate: CandidateInit,
    ) {
        let Some(room_id) = self.room_id() else { return };

        let command = match direction {
            LinkDirection::FromProducer => ClientCommand::SendCandidateToProducer {
                room_id,
                producer_participant: counterpart.clone(),
                candidate,
            },
            LinkDirection::ToConsumer => ClientCommand::SendCandidateToConsumer {
                room_id,
                consumer_id: counterpart.clone(),
                candidate,
            },
        };
        if let Err(e) = self.channel.notify(command) {
            warn!("relaying candidate for {counterpart} failed: {e}");
        }
    }

    // ---- teardown ------------------------------------------------------

    async fn drop_consumer_link(&mut self, counterpart: &ParticipantId) {
        if let Some(mut link) = self.consumer_links.remove(counterpart) {
            let _ = link.close().await;
        }
        self.remote_streams.remove(counterpart);
        self.consumers.retain(|_, e| &e.counterpart != counterpart);
    }

    /// A co-host lost producing rights or disappeared: their media, links
    /// and source registrations go away. Returns the participant id so the
    /// caller can report the specific event.
    async fn on_co_host_gone(&mut self, participant_id: ParticipantId) -> ParticipantId {
        if participant_id == self.identity.participant_id {
            if let Some(session) = self.session.as_mut() {
                session.role = Role::Viewer;
            }
            for (kind, entry) in self.producers.drain() {
                entry.track.set_enabled(false);
                self.capture.close(kind).await;
            }
            for (_, mut link) in self.responder_links.drain() {
                let _ = link.close().await;
            }
        } else {
            self.roles.mark_removed(participant_id.clone());
            self.purge_counterpart(&participant_id).await;
        }
        participant_id
    }

    async fn purge_counterpart(&mut self, counterpart: &ParticipantId) {
        self.drop_consumer_link(counterpart).await;
        self.remote_sources.remove_for(counterpart);
    }

    /// The single exit path for a session. Closes every link, releases
    /// capture, clears all registries and reports the reason exactly once.
    async fn teardown(&mut self, reason: SessionEndReason) {
        let had_session = self.session.take().is_some();
        self.pending_join = None;

        for (_, mut link) in self.consumer_links.drain() {
            let _ = link.close().await;
        }
        for (_, mut link) in self.responder_links.drain() {
            let _ = link.close().await;
        }
        for (kind, entry) in self.producers.drain() {
            entry.track.set_enabled(false);
            self.capture.close(kind).await;
        }
        self.consumers.clear();
        self.remote_sources.clear();
        self.remote_streams.clear();
        self.roles.clear_participants();

        if had_session {
            info!("session ended: {reason:?}");
            self.emit(StreamEvent::SessionEnded { reason });
        }
    }

    fn refresh_snapshot(&self) {
        let links = self
            .consumer_links
            .values()
            .chain(self.responder_links.values())
            .map(|link| LinkInfo {
                counterpart: link.counterpart().clone(),
                direction: link.direction(),
                state: link.state(),
                kinds: link.kinds(),
            })
            .collect();

        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        snapshot.room = self.room_id();
        snapshot.role = self.session.as_ref().map(|s| s.role);
        snapshot.producer_kinds = self.producers.kinds();
        snapshot.links = links;
    }
}
