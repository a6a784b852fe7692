mod media;
mod participant;
mod room;
mod signaling;

pub use media::{ConsumerId, MediaKind, ProducerId};
pub use participant::{ParticipantId, Role};
pub use room::{RoomId, StreamInfo, Visibility};
pub use signaling::{
    CandidateInit, ClientCommand, IceServerConfig, Invocation, SdpType, ServerEvent,
    SessionDescription,
};
