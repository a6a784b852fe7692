use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::media::LocalTrack;
use crate::peer::CandidateGate;
use stagecast_core::{CandidateInit, IceServerConfig, MediaKind, ParticipantId};

/// Bound on waiting for candidate gathering before an offer or answer is
/// shipped; gathering is not guaranteed to complete on all networks and the
/// trickle path covers the remainder.
pub const GATHERING_TIMEOUT: Duration = Duration::from_secs(3);

/// Which way this link carries media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// This client produces; the counterpart consumes.
    ToConsumer,
    /// This client consumes; the counterpart produces.
    FromProducer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    OfferSent,
    OfferReceived,
    AnswerSent,
    AnswerReceived,
    Stable,
    Closed,
}

/// Events a link pushes into the orchestrator loop.
#[derive(Debug)]
pub enum PeerEvent {
    CandidateGenerated {
        counterpart: ParticipantId,
        direction: LinkDirection,
        candidate: CandidateInit,
    },
    TrackReceived {
        counterpart: ParticipantId,
        kind: MediaKind,
        track: Arc<TrackRemote>,
    },
    LinkFailed {
        counterpart: ParticipantId,
        direction: LinkDirection,
    },
}

/// One peer connection to one remote counterpart, together with its
/// candidate gate and negotiation bookkeeping. At most one link exists per
/// counterpart per direction; an additional media kind renegotiates the
/// existing link instead of creating a second one.
pub struct PeerLink {
    counterpart: ParticipantId,
    direction: LinkDirection,
    pc: Arc<RTCPeerConnection>,
    gate: CandidateGate,
    state: NegotiationState,
    kinds: HashSet<MediaKind>,
    recv_kinds: HashSet<MediaKind>,
    sent_kinds: HashSet<MediaKind>,
}

impl PeerLink {
    /// Build the underlying peer connection and wire its callbacks into
    /// `event_tx` for the orchestrator loop.
    pub async fn new(
        counterpart: ParticipantId,
        direction: LinkDirection,
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::Sender<PeerEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        let state_counterpart = counterpart.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            let counterpart = state_counterpart.clone();

            Box::pin(async move {
                info!("peer connection state for {counterpart}: {s}");
                if matches!(
                    s,
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected
                ) {
                    let _ = tx
                        .send(PeerEvent::LinkFailed {
                            counterpart,
                            direction,
                        })
                        .await;
                }
            })
        }));

        let ice_tx = event_tx.clone();
        let ice_counterpart = counterpart.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let counterpart = ice_counterpart.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx
                    .send(PeerEvent::CandidateGenerated {
                        counterpart,
                        direction,
                        candidate: CandidateInit {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        },
                    })
                    .await;
            })
        }));

        let track_tx = event_tx.clone();
        let track_counterpart = counterpart.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            let counterpart = track_counterpart.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => MediaKind::Audio,
                    _ => MediaKind::Video,
                };
                debug!("received {kind} track from {counterpart}");
                let _ = tx
                    .send(PeerEvent::TrackReceived {
                        counterpart,
                        kind,
                        track,
                    })
                    .await;
            })
        }));

        Ok(Self {
            counterpart,
            direction,
            pc,
            gate: CandidateGate::new(),
            state: NegotiationState::New,
            kinds: HashSet::new(),
            recv_kinds: HashSet::new(),
            sent_kinds: HashSet::new(),
        })
    }

    pub fn counterpart(&self) -> &ParticipantId {
        &self.counterpart
    }

    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_stable(&self) -> bool {
        self.state == NegotiationState::Stable
    }

    pub fn is_closed(&self) -> bool {
        self.state == NegotiationState::Closed
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        self.kinds.iter().copied().collect()
    }

    pub fn mark_kind(&mut self, kind: MediaKind) {
        self.kinds.insert(kind);
    }

    /// Request reception of `kind` on this link (receive-only transceiver).
    /// Safe to call repeatedly; each kind is requested once per link.
    pub async fn ensure_recv(&mut self, kind: MediaKind) -> Result<()> {
        if !self.recv_kinds.insert(kind) {
            return Ok(());
        }

        let codec_type = match kind {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        };
        self.pc
            .add_transceiver_from_kind(
                codec_type,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .with_context(|| format!("failed to add {kind} transceiver"))?;
        Ok(())
    }

    /// Attach a local track for sending. Each kind is attached once.
    pub async fn attach_local(&mut self, track: &LocalTrack) -> Result<()> {
        if !self.sent_kinds.insert(track.kind()) {
            return Ok(());
        }

        self.pc
            .add_track(track.rtc_track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("failed to attach local {} track", track.kind()))?;
        self.kinds.insert(track.kind());
        Ok(())
    }

    /// Create and apply a local offer, wait for candidate gathering (bounded
    /// by [`GATHERING_TIMEOUT`]) and return the SDP to relay.
    pub async fn create_offer_bounded(&mut self) -> Result<String> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .context("failed to create offer")?;
        self.pc
            .set_local_description(offer)
            .await
            .context("failed to set local offer")?;

        self.wait_gathering().await;
        self.state = NegotiationState::OfferSent;
        self.local_sdp().await
    }

    /// Apply the counterpart's answer and release the candidate gate.
    pub async fn apply_remote_answer(&mut self, sdp: &str) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp.to_string())?;
        self.pc
            .set_remote_description(answer)
            .await
            .context("failed to set remote answer")?;

        self.state = NegotiationState::AnswerReceived;
        self.flush_gate().await;
        self.state = NegotiationState::Stable;
        Ok(())
    }

    /// Apply the counterpart's offer and release the candidate gate.
    pub async fn apply_remote_offer(&mut self, sdp: &str) -> Result<()> {
        let offer = RTCSessionDescription::offer(sdp.to_string())?;
        self.pc
            .set_remote_description(offer)
            .await
            .context("failed to set remote offer")?;

        self.state = NegotiationState::OfferReceived;
        self.flush_gate().await;
        Ok(())
    }

    /// Create an answer, run it through `shape`, apply it locally, wait for
    /// gathering and return the SDP to relay.
    pub async fn create_answer_bounded<F>(&mut self, shape: F) -> Result<String>
    where
        F: FnOnce(&str) -> String,
    {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .context("failed to create answer")?;

        let shaped = RTCSessionDescription::answer(shape(&answer.sdp))?;
        self.pc
            .set_local_description(shaped)
            .await
            .context("failed to set local answer")?;

        self.wait_gathering().await;
        self.state = NegotiationState::AnswerSent;
        self.local_sdp().await
    }

    /// Apply a relayed remote candidate, or buffer it while the remote
    /// description is still pending.
    pub async fn handle_remote_candidate(&mut self, candidate: CandidateInit) {
        match self.gate.push(candidate) {
            Some(ready) => {
                if let Err(e) = self.add_candidate(ready).await {
                    warn!("failed to add candidate from {}: {e}", self.counterpart);
                }
            }
            None => debug!(
                "buffered candidate from {} until description applies",
                self.counterpart
            ),
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.state = NegotiationState::Closed;
        self.pc.close().await?;
        Ok(())
    }

    async fn flush_gate(&mut self) {
        for candidate in self.gate.open() {
            if let Err(e) = self.add_candidate(candidate).await {
                warn!(
                    "failed to apply buffered candidate from {}: {e}",
                    self.counterpart
                );
            }
        }
    }

    async fn add_candidate(&self, candidate: CandidateInit) -> Result<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await
            .context("failed to add ICE candidate")
    }

    async fn wait_gathering(&self) {
        let mut done = self.pc.gathering_complete_promise().await;
        if tokio::time::timeout(GATHERING_TIMEOUT, done.recv())
            .await
            .is_err()
        {
            warn!(
                "candidate gathering for {} still incomplete, proceeding",
                self.counterpart
            );
        }
    }

    async fn local_sdp(&self) -> Result<String> {
        let desc = self
            .pc
            .local_description()
            .await
            .context("local description missing after negotiation")?;
        Ok(desc.sdp)
    }
}
