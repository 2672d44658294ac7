// Network layer: REST API client and the Socket.IO push transport.

pub mod api;
pub mod error;
pub mod memory;
pub mod socket;
pub mod ws;

pub use api::{ChatApi, HttpApi};
pub use error::{ApiError, TransportError};
pub use memory::MemoryConnector;
pub use socket::{ListenerId, PushConnector, SocketHandle};
pub use ws::{socket_endpoint, WsConnector};
