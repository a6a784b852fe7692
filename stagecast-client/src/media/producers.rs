use std::collections::HashMap;

use stagecast_core::{MediaKind, ProducerId};

use crate::media::LocalTrack;

/// One announced local producer. The id is filled in when the hub
/// acknowledges the announcement.
pub struct ProducerEntry {
    pub id: Option<ProducerId>,
    pub track: LocalTrack,
    pub paused: bool,
}

/// Local producers keyed by media kind. Exactly one producer per kind may
/// be active per session; the registry is owned and mutated only by the
/// orchestrator.
#[derive(Default)]
pub struct ProducerRegistry {
    entries: HashMap<MediaKind, ProducerEntry>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, kind: MediaKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn insert(&mut self, kind: MediaKind, track: LocalTrack) {
        self.entries.insert(
            kind,
            ProducerEntry {
                id: None,
                track,
                paused: false,
            },
        );
    }

    /// Record the server-issued id for the pending producer of `kind`.
    pub fn assign_id(&mut self, kind: MediaKind, id: ProducerId) {
        if let Some(entry) = self.entries.get_mut(&kind) {
            entry.id = Some(id);
        }
    }

    pub fn kind_of(&self, id: &ProducerId) -> Option<MediaKind> {
        self.entries
            .iter()
            .find(|(_, e)| e.id.as_ref() == Some(id))
            .map(|(kind, _)| *kind)
    }

    /// Toggle pause state, flipping the track's enabled flag. Idempotent:
    /// repeating the current state is a no-op and returns false.
    pub fn set_paused(&mut self, id: &ProducerId, paused: bool) -> Option<bool> {
        let kind = self.kind_of(id)?;
        let entry = self.entries.get_mut(&kind)?;

        if entry.paused == paused {
            return Some(false);
        }
        entry.paused = paused;
        entry.track.set_enabled(!paused);
        Some(true)
    }

    pub fn remove(&mut self, id: &ProducerId) -> Option<(MediaKind, ProducerEntry)> {
        let kind = self.kind_of(id)?;
        self.entries.remove(&kind).map(|e| (kind, e))
    }

    pub fn remove_kind(&mut self, kind: MediaKind) -> Option<ProducerEntry> {
        self.entries.remove(&kind)
    }

    pub fn drain(&mut self) -> Vec<(MediaKind, ProducerEntry)> {
        self.entries.drain().collect()
    }

    /// Every track currently offered, paused ones included (they stay
    /// attached to links, just disabled).
    pub fn active_tracks(&self) -> Vec<LocalTrack> {
        self.entries.values().map(|e| e.track.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        self.entries.keys().copied().collect()
    }
}
