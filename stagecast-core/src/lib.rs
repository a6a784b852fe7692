pub mod model;

pub use model::{
    CandidateInit, ClientCommand, ConsumerId, IceServerConfig, Invocation, MediaKind,
    ParticipantId, ProducerId, Role, RoomId, SdpType, ServerEvent, SessionDescription, StreamInfo,
    Visibility,
};
