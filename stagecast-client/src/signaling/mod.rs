mod channel;
mod transport;

pub use channel::{
    ChannelEvent, INVOKE_TIMEOUT, MAX_RECONNECT_DELAY, RECONNECT_WINDOW, SignalingChannel,
};
pub use transport::{SignalConnection, SignalTransport, WsTransport};
