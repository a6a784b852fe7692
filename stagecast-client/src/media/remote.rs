use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use webrtc::track::track_remote::TrackRemote;

use stagecast_core::{MediaKind, ParticipantId, ProducerId};

/// A remote producer announced by the hub, resolved to the participant that
/// owns it. Kept so candidate routing and teardown know which counterpart a
/// producer id belongs to.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    pub producer_id: ProducerId,
    pub counterpart: ParticipantId,
    pub kind: MediaKind,
    pub display_name: String,
}

#[derive(Debug, Default)]
pub struct RemoteSourceRegistry {
    by_producer: HashMap<ProducerId, RemoteSource>,
}

impl RemoteSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: RemoteSource) {
        self.by_producer.insert(source.producer_id.clone(), source);
    }

    pub fn get(&self, id: &ProducerId) -> Option<&RemoteSource> {
        self.by_producer.get(id)
    }

    pub fn remove(&mut self, id: &ProducerId) -> Option<RemoteSource> {
        self.by_producer.remove(id)
    }

    /// Drop every source owned by `counterpart`, returning the removed set.
    pub fn remove_for(&mut self, counterpart: &ParticipantId) -> Vec<RemoteSource> {
        let ids: Vec<ProducerId> = self
            .by_producer
            .iter()
            .filter(|(_, s)| &s.counterpart == counterpart)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| self.by_producer.remove(id)).collect()
    }

    pub fn has_for(&self, counterpart: &ParticipantId) -> bool {
        self.by_producer.values().any(|s| &s.counterpart == counterpart)
    }

    pub fn remove_kind_for(
        &mut self,
        counterpart: &ParticipantId,
        kind: MediaKind,
    ) -> Option<RemoteSource> {
        let id = self
            .by_producer
            .iter()
            .find(|(_, s)| &s.counterpart == counterpart && s.kind == kind)
            .map(|(id, _)| id.clone())?;
        self.by_producer.remove(&id)
    }

    pub fn clear(&mut self) {
        self.by_producer.clear();
    }

    pub fn len(&self) -> usize {
        self.by_producer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_producer.is_empty()
    }
}

#[derive(Clone)]
pub struct RemoteTrack {
    pub kind: MediaKind,
    pub track: Arc<TrackRemote>,
}

/// All tracks received from one counterpart, grouped so consumers of the
/// library see a single stream per remote participant regardless of how
/// many kinds it carries.
#[derive(Clone)]
pub struct RemoteStream {
    counterpart: ParticipantId,
    tracks: Arc<Mutex<Vec<RemoteTrack>>>,
}

impl RemoteStream {
    fn new(counterpart: ParticipantId) -> Self {
        Self {
            counterpart,
            tracks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn counterpart(&self) -> &ParticipantId {
        &self.counterpart
    }

    fn add_track(&self, kind: MediaKind, track: Arc<TrackRemote>) {
        let mut tracks = self.tracks.lock().unwrap_or_else(|e| e.into_inner());
        tracks.retain(|t| t.kind != kind);
        tracks.push(RemoteTrack { kind, track });
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        self.tracks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    pub fn track(&self, kind: MediaKind) -> Option<Arc<TrackRemote>> {
        self.tracks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| Arc::clone(&t.track))
    }

    pub fn track_count(&self) -> usize {
        self.tracks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("counterpart", &self.counterpart)
            .field("tracks", &self.track_count())
            .finish()
    }
}

/// Remote streams keyed by counterpart. A second track from the same
/// counterpart lands in the existing stream rather than creating another.
#[derive(Debug, Default)]
pub struct RemoteStreams {
    streams: HashMap<ParticipantId, RemoteStream>,
}

impl RemoteStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a received track. Returns the stream when this counterpart is
    /// new; an existing stream absorbs the track and returns None.
    pub fn attach(
        &mut self,
        counterpart: &ParticipantId,
        kind: MediaKind,
        track: Arc<TrackRemote>,
    ) -> Option<RemoteStream> {
        match self.streams.get(counterpart) {
            Some(stream) => {
                stream.add_track(kind, track);
                None
            }
            None => {
                let stream = RemoteStream::new(counterpart.clone());
                stream.add_track(kind, track);
                self.streams.insert(counterpart.clone(), stream.clone());
                Some(stream)
            }
        }
    }

    pub fn get(&self, counterpart: &ParticipantId) -> Option<&RemoteStream> {
        self.streams.get(counterpart)
    }

    pub fn remove(&mut self, counterpart: &ParticipantId) -> Option<RemoteStream> {
        self.streams.remove(counterpart)
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
