use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use stagecast_core::MediaKind;

/// Quality hints passed to the capture subsystem for audio tracks.
#[derive(Debug, Clone)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub sample_size: u16,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: 48_000,
            channel_count: 1,
            sample_size: 16,
        }
    }
}

/// Quality hints passed to the capture subsystem for video tracks.
#[derive(Debug, Clone)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub max_frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            max_frame_rate: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    pub audio: AudioConstraints,
    pub video: VideoConstraints,
}

/// A locally captured track offered to the room. The enabled flag is the
/// local half of producer pause: capture sources must stop writing samples
/// while it is off.
#[derive(Clone)]
pub struct LocalTrack {
    kind: MediaKind,
    rtc: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, rtc: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            rtc,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.rtc) as Arc<dyn TrackLocal + Send + Sync>
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// External capture collaborator: microphones, cameras, file sources.
/// The orchestrator opens one track per kind and closes it when the
/// producer closes or the session tears down.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn open(&self, kind: MediaKind, config: &CaptureConfig) -> Result<LocalTrack>;

    async fn close(&self, kind: MediaKind);
}
