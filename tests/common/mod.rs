//! Integration test common infrastructure.
//!
//! Provides a scripted IRC server peer and a bot harness that runs the
//! socket pool on its own thread and drains the event bus on demand.

pub mod bot;
pub mod server;

#[allow(unused_imports)]
pub use bot::TestBot;
#[allow(unused_imports)]
pub use server::{ServerPeer, TestServer};
