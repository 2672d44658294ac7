//! Client-side synchronization core for Chatty.
//!
//! The containers here hold everything a front end renders: who is signed
//! in, who is online, the contact list, the open conversation and the
//! theme. [`ChatClient`] wires them to the REST API and the push transport.

pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod notifier;
pub mod presence;
pub mod session;
pub mod theme;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::ChatClient;
pub use config::ClientConfig;
pub use conversation::{ConversationState, ConversationStore};
pub use error::ClientError;
pub use notifier::{Notice, NoticeLevel, Notifier};
pub use presence::PresenceTracker;
pub use session::{SessionManager, SessionPhase, SessionState};
pub use theme::ThemeStore;
pub use transport::TransportManager;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Call once, from the binary.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("chatty=info,chatty_client=debug,chatty_net=debug,chatty_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
