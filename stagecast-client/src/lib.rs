//! Client-side orchestration for live broadcast rooms.
//!
//! The crate connects to a signaling hub, keeps the connection alive across
//! short outages, negotiates direct media links with other participants and
//! surfaces everything relevant as a stream of [`StreamEvent`]s. The
//! application supplies a [`MediaCapture`] implementation for its platform
//! and drives the session through the [`StreamingClient`] handle.

pub mod client;
pub mod error;
pub mod events;
pub mod media;
pub mod peer;
pub mod roles;
pub mod session;
pub mod signaling;

mod orchestrator;

pub use client::{ClientConfig, LinkInfo, Snapshot, StreamingClient};
pub use error::Error;
pub use events::{SessionEndReason, StreamEvent};
pub use media::{CaptureConfig, LocalTrack, MediaCapture, RemoteStream};
pub use peer::{LinkDirection, NegotiationState};
pub use session::RoomSession;
pub use signaling::{SignalConnection, SignalTransport, SignalingChannel, WsTransport};
