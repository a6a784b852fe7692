use stagecast_core::{MediaKind, ParticipantId, ProducerId, Role, RoomId};

use crate::media::RemoteStream;

/// Why the current session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// We left voluntarily.
    Left,
    /// The host ended the stream.
    Ended,
    /// The host removed us from the room.
    Removed,
    /// The host blocked us; rejoining this room will be refused locally.
    Blocked,
    /// The signaling channel gave up reconnecting.
    ChannelLost,
}

/// Everything the application layer observes about a running session.
/// Delivered on the event receiver returned at connect time, in the order
/// the orchestrator processed the underlying causes.
#[derive(Debug)]
pub enum StreamEvent {
    StreamStarted {
        room_id: RoomId,
    },
    JoinedStream {
        room_id: RoomId,
        role: Role,
    },
    /// A remote participant has media available for consumption.
    ProducerAvailable {
        producer_id: ProducerId,
        participant_id: ParticipantId,
        kind: MediaKind,
        display_name: String,
    },
    ProducerPaused {
        producer_id: ProducerId,
    },
    ProducerResumed {
        producer_id: ProducerId,
    },
    ProducerClosed {
        producer_id: ProducerId,
    },
    /// First track arrived from a counterpart; later tracks from the same
    /// counterpart land in this stream without another event.
    RemoteStream {
        counterpart: ParticipantId,
        kind: MediaKind,
        stream: RemoteStream,
    },
    /// A consume attempt failed; the application decides whether to retry.
    ConsumeFailed {
        counterpart: ParticipantId,
        reason: String,
    },
    /// A counterpart asked to consume from us before any local producer
    /// existed. The link was answered without media.
    NoLocalMedia {
        consumer: ParticipantId,
    },
    UserJoined {
        participant_id: ParticipantId,
        display_name: String,
        role: Role,
    },
    UserLeft {
        participant_id: ParticipantId,
    },
    /// The host removed another participant from the room.
    UserRemoved {
        participant_id: ParticipantId,
    },
    /// The host blocked another participant from the room.
    UserBlocked {
        participant_id: ParticipantId,
        room_id: RoomId,
    },
    MessageReceived {
        sender: ParticipantId,
        display_name: String,
        body: String,
    },
    CoHostInvited {
        participant_id: ParticipantId,
    },
    CoHostAdded {
        participant_id: ParticipantId,
    },
    CoHostRemoved {
        participant_id: ParticipantId,
    },
    CoHostLeft {
        participant_id: ParticipantId,
    },
    AccessDenied {
        room_id: RoomId,
        message: String,
    },
    /// Error relayed by the hub that no pending command claimed.
    HubError {
        message: String,
        code: Option<String>,
    },
    Reconnecting,
    Reconnected,
    Disconnected,
    SessionEnded {
        reason: SessionEndReason,
    },
}
