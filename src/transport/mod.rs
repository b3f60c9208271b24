//! Websocket transport for client traffic
//!
//! Each connection is assigned an opaque session tag on upgrade. The tag
//! addresses broadcasts and cancels queue entries on disconnect.

pub mod handler;
pub mod registry;
pub mod socket;

// Re-export commonly used types
pub use handler::{websocket_handler, ClientEventHandler, TransportState};
pub use registry::{ConnectionRegistry, InMemoryConnectionRegistry};
pub use socket::{Connection, SocketError, SocketWrapper};
