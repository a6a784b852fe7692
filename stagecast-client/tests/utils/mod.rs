pub mod harness;
pub mod mock_capture;
pub mod mock_hub;
pub mod rtc_helpers;

pub use harness::*;
pub use mock_capture::*;
pub use mock_hub::*;
pub use rtc_helpers::*;
