//! Types and wire formats shared by every Chatty crate.

pub mod color;
pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::{ColorError, ProtocolError};
pub use models::{
    AddContactRequest, AuthUser, ChatUser, Credentials, Message, MessageContent, ProfileUpdate,
    SignupDetails,
};
pub use protocol::{EnginePacket, PushEvent, PushEventKind, SocketPacket};
pub use types::{MessageId, UserId};
