use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use stagecast_client::media::{CaptureConfig, LocalTrack, MediaCapture};
use stagecast_core::MediaKind;

/// Capture double that hands out silent static tracks and records what was
/// opened and closed.
#[derive(Default)]
pub struct MockCapture {
    open_tracks: Mutex<HashMap<MediaKind, LocalTrack>>,
    closed: Mutex<Vec<MediaKind>>,
}

impl MockCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The track last opened for `kind`, if it is still open.
    pub fn track(&self, kind: MediaKind) -> Option<LocalTrack> {
        self.open_tracks.lock().unwrap().get(&kind).cloned()
    }

    pub fn closed_kinds(&self) -> Vec<MediaKind> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaCapture for MockCapture {
    async fn open(&self, kind: MediaKind, _config: &CaptureConfig) -> Result<LocalTrack> {
        let codec = match kind {
            MediaKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            MediaKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_string(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let track = LocalTrack::new(
            kind,
            Arc::new(TrackLocalStaticSample::new(
                codec,
                kind.as_str().to_string(),
                "mock-capture".to_string(),
            )),
        );
        self.open_tracks.lock().unwrap().insert(kind, track.clone());
        Ok(track)
    }

    async fn close(&self, kind: MediaKind) {
        self.open_tracks.lock().unwrap().remove(&kind);
        self.closed.lock().unwrap().push(kind);
    }
}
