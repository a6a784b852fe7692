pub mod channel_tests;
