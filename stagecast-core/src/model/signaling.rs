use crate::model::{ConsumerId, MediaKind, ParticipantId, ProducerId, Role, RoomId, StreamInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

/// A trickled network candidate, in the shape the hub relays it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

/// Events delivered by the hub to the client.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "op", content = "d")]
pub enum ServerEvent {
    StreamStarted {
        room_id: RoomId,
        stream: StreamInfo,
    },
    JoinedStream {
        room_id: RoomId,
        role: Role,
        stream: StreamInfo,
    },
    ProducerCreated {
        producer_id: ProducerId,
        kind: MediaKind,
    },
    NewProducer {
        producer_id: ProducerId,
        participant_id: ParticipantId,
        kind: MediaKind,
        display_name: Option<String>,
    },
    ConsumerCreated {
        consumer_id: ConsumerId,
        producer_id: ProducerId,
        producer_participant: ParticipantId,
        kind: MediaKind,
    },
    ProducerPaused {
        producer_id: ProducerId,
    },
    ProducerResumed {
        producer_id: ProducerId,
    },
    ProducerClosed {
        producer_id: ProducerId,
        participant_id: Option<ParticipantId>,
    },
    UserJoined {
        participant_id: ParticipantId,
        username: String,
        role: Role,
    },
    UserLeft {
        participant_id: ParticipantId,
    },
    MessageReceived {
        sender_id: ParticipantId,
        username: String,
        body: String,
        sent_at: u64,
    },
    StreamEnded {
        room_id: RoomId,
    },
    CoHostInvited {
        participant_id: ParticipantId,
    },
    CoHostAdded {
        participant_id: ParticipantId,
        display_name: String,
    },
    CoHostRemoved {
        participant_id: ParticipantId,
    },
    CoHostLeft {
        participant_id: ParticipantId,
    },
    CoHostMediaRemoved {
        participant_id: ParticipantId,
        kind: MediaKind,
    },
    UserRemoved {
        participant_id: ParticipantId,
    },
    UserBlocked {
        participant_id: ParticipantId,
        room_id: RoomId,
    },
    Error {
        message: String,
        code: Option<String>,
    },
    OfferFromConsumer {
        consumer_id: ParticipantId,
        offer: SessionDescription,
    },
    AnswerFromProducer {
        producer_participant: ParticipantId,
        answer: SessionDescription,
    },
    CandidateFromConsumer {
        consumer_id: ParticipantId,
        candidate: CandidateInit,
    },
    CandidateFromProducer {
        producer_participant: ParticipantId,
        candidate: CandidateInit,
    },
    /// Acknowledgement of a numbered command invocation.
    Ack {
        id: u64,
        error: Option<String>,
    },
}

/// Commands the client issues to the hub.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "op", content = "d")]
pub enum ClientCommand {
    StartStream {
        participant_id: ParticipantId,
        username: String,
        stream: StreamInfo,
    },
    JoinStream {
        room_id: RoomId,
        participant_id: ParticipantId,
        username: String,
    },
    ProduceMedia {
        room_id: RoomId,
        kind: MediaKind,
    },
    ConsumeMedia {
        room_id: RoomId,
        producer_id: ProducerId,
    },
    PauseProducer {
        room_id: RoomId,
        producer_id: ProducerId,
    },
    ResumeProducer {
        room_id: RoomId,
        producer_id: ProducerId,
    },
    CloseProducer {
        room_id: RoomId,
        producer_id: ProducerId,
    },
    SendMessage {
        room_id: RoomId,
        body: String,
    },
    LeaveStream {
        room_id: RoomId,
    },
    EndStream {
        room_id: RoomId,
    },
    InviteCoHost {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    AcceptCoHost {
        room_id: RoomId,
    },
    RejectCoHost {
        room_id: RoomId,
    },
    RemoveCoHost {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    LeaveCoHost {
        room_id: RoomId,
    },
    RemoveUser {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    BlockUser {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    SendOfferToProducer {
        room_id: RoomId,
        producer_participant: ParticipantId,
        offer: SessionDescription,
    },
    SendAnswerToConsumer {
        room_id: RoomId,
        consumer_id: ParticipantId,
        answer: SessionDescription,
    },
    SendCandidateToProducer {
        room_id: RoomId,
        producer_participant: ParticipantId,
        candidate: CandidateInit,
    },
    SendCandidateToConsumer {
        room_id: RoomId,
        consumer_id: ParticipantId,
        candidate: CandidateInit,
    },
}

impl ClientCommand {
    /// Command name as it appears on the wire, for error reporting.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::StartStream { .. } => "StartStream",
            ClientCommand::JoinStream { .. } => "JoinStream",
            ClientCommand::ProduceMedia { .. } => "ProduceMedia",
            ClientCommand::ConsumeMedia { .. } => "ConsumeMedia",
            ClientCommand::PauseProducer { .. } => "PauseProducer",
            ClientCommand::ResumeProducer { .. } => "ResumeProducer",
            ClientCommand::CloseProducer { .. } => "CloseProducer",
            ClientCommand::SendMessage { .. } => "SendMessage",
            ClientCommand::LeaveStream { .. } => "LeaveStream",
            ClientCommand::EndStream { .. } => "EndStream",
            ClientCommand::InviteCoHost { .. } => "InviteCoHost",
            ClientCommand::AcceptCoHost { .. } => "AcceptCoHost",
            ClientCommand::RejectCoHost { .. } => "RejectCoHost",
            ClientCommand::RemoveCoHost { .. } => "RemoveCoHost",
            ClientCommand::LeaveCoHost { .. } => "LeaveCoHost",
            ClientCommand::RemoveUser { .. } => "RemoveUser",
            ClientCommand::BlockUser { .. } => "BlockUser",
            ClientCommand::SendOfferToProducer { .. } => "SendOfferToProducer",
            ClientCommand::SendAnswerToConsumer { .. } => "SendAnswerToConsumer",
            ClientCommand::SendCandidateToProducer { .. } => "SendCandidateToProducer",
            ClientCommand::SendCandidateToConsumer { .. } => "SendCandidateToConsumer",
        }
    }
}

/// Envelope for a command sent over the channel. Commands that expect an
/// acknowledgement carry an invocation id the hub echoes back in `Ack`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Invocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub command: ClientCommand,
}
