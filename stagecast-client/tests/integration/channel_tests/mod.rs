pub mod test_command_rejection;
pub mod test_reconnect;
