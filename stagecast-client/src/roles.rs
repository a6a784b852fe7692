use std::collections::{HashMap, HashSet};

use stagecast_core::{ParticipantId, RoomId};

/// Per-participant role state, layered over the media session.
///
/// `Viewer -> Invited -> CoHost -> (Removed | Left | Blocked)`, with
/// `Viewer -> Removed` and `Viewer -> Blocked` reachable directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Viewer,
    Invited,
    CoHost,
    Removed,
    Left,
    Blocked,
}

#[derive(Default)]
pub struct RoleOverlay {
    states: HashMap<ParticipantId, ParticipantState>,
    blocked_rooms: HashSet<RoomId>,
}

impl RoleOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, id: &ParticipantId) -> ParticipantState {
        self.states
            .get(id)
            .copied()
            .unwrap_or(ParticipantState::Viewer)
    }

    pub fn mark_invited(&mut self, id: ParticipantId) {
        self.states.insert(id, ParticipantState::Invited);
    }

    pub fn mark_co_host(&mut self, id: ParticipantId) {
        self.states.insert(id, ParticipantState::CoHost);
    }

    /// Returns true when the participant held media-producing state, i.e.
    /// their peer links and source registrations must be torn down.
    pub fn mark_removed(&mut self, id: ParticipantId) -> bool {
        let was = self.state_of(&id);
        self.states.insert(id, ParticipantState::Removed);
        was == ParticipantState::CoHost
    }

    pub fn mark_left(&mut self, id: ParticipantId) -> bool {
        let was = self.state_of(&id);
        self.states.insert(id, ParticipantState::Left);
        was == ParticipantState::CoHost
    }

    pub fn mark_blocked(&mut self, id: ParticipantId, room: RoomId) -> bool {
        let was = self.state_of(&id);
        self.states.insert(id, ParticipantState::Blocked);
        self.blocked_rooms.insert(room);
        was == ParticipantState::CoHost
    }

    /// Rooms this identity was blocked from; a rejoin attempt must surface
    /// as access denied rather than a generic error.
    pub fn is_room_blocked(&self, room: &RoomId) -> bool {
        self.blocked_rooms.contains(room)
    }

    pub fn clear_participants(&mut self) {
        self.states.clear();
        // blocked_rooms survives the session so a rejoin is still flagged
    }
}
