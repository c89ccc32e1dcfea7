pub mod phase;
pub mod poller;
