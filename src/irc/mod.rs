//! IRC protocol engine: one [`Connection`] per network.

mod connection;
mod dispatch;
mod state;

pub use connection::{Connection, ConnectionState};
pub use state::{ChannelInfo, Member, UserInfo};
