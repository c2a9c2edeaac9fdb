// Peer protocol: wire framing and the TCP server with its message handlers.
pub mod message;
pub mod server;

pub use message::{COMMAND_LENGTH, InvKind, Message};
pub use server::Server;
