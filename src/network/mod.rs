//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor loop (non-blocking, polls the shutdown flag)
//! - One reader thread + one writer thread per connection
//! - Requests routed through a `Session`; events through the `ConnectionHub`

mod server;
mod connection;
mod hub;

pub use server::Server;
pub use connection::Connection;
pub use hub::ConnectionHub;
