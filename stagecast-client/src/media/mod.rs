mod capture;
mod producers;
mod remote;

pub use capture::{AudioConstraints, CaptureConfig, LocalTrack, MediaCapture, VideoConstraints};
pub use producers::{ProducerEntry, ProducerRegistry};
pub use remote::{RemoteSource, RemoteSourceRegistry, RemoteStream, RemoteStreams, RemoteTrack};
