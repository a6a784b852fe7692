pub use stagecast_core::ParticipantId;

pub mod model {
    pub use stagecast_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use stagecast_client::*;
}
