mod candidates;
mod link;
mod sdp;

pub use candidates::CandidateGate;
pub use link::{
    GATHERING_TIMEOUT, LinkDirection, NegotiationState, PeerEvent, PeerLink,
};
pub use sdp::{prefer_opus, shape_answer, shape_opus};
