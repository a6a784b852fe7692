use stagecast_core::{MediaKind, RoomId};
use thiserror::Error;

/// Failure taxonomy of the streaming client.
///
/// `Connection` and a terminal channel disconnect are session-fatal; every
/// other variant is scoped to the operation that produced it and leaves the
/// rest of the session usable.
#[derive(Debug, Error)]
pub enum Error {
    /// The signaling channel could not be established.
    #[error("signaling connection failed: {0}")]
    Connection(String),

    /// A specific invoked command was rejected or timed out.
    #[error("command {command} failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },

    /// Local capture or producer announcement failed for one media kind.
    #[error("failed to produce {kind}: {reason}")]
    Produce { kind: MediaKind, reason: String },

    /// Negotiation for one remote source failed.
    #[error("failed to consume: {0}")]
    Consume(String),

    /// The hub rejected the request because this identity was blocked or
    /// removed from the room. Distinct from `Command` so the caller can show
    /// an access message instead of a retry prompt.
    #[error("access denied to room {room}")]
    AccessDenied { room: RoomId },

    /// The operation needs an active room session and there is none, or a
    /// session already exists where none may.
    #[error("{0}")]
    Session(String),

    /// The client has been shut down and its worker is gone.
    #[error("client is closed")]
    Closed,
}
