//! Realtime broadcast hub.
//!
//! One [`ClientConnection`] per socket, tracked by the [`Hub`].
//! Connections opt into event kinds with a `subscribe` message (`"*"`
//! for everything) and may register an agent identity for targeted
//! delivery. Outbound frames are serialized once and shared.

mod connection;
mod hub;
pub mod protocol;
mod session;

pub use connection::ClientConnection;
pub use hub::Hub;
pub use session::ws_handler;
