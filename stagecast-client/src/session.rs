use stagecast_core::{MediaKind, Role, RoomId};

/// The active broadcast context. Exactly one exists per client instance;
/// it is created on a successful start/join event from the hub and destroyed
/// by the single teardown path (leave, end, removal, channel loss).
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub room_id: RoomId,
    pub role: Role,
    pub stream_kind: MediaKind,
}

impl RoomSession {
    pub fn new(room_id: RoomId, role: Role, stream_kind: MediaKind) -> Self {
        Self {
            room_id,
            role,
            stream_kind,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}
