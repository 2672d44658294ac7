//! In-process push connector.
//!
//! Connects instantly and lets the caller inject events or simulate a
//! server-side drop. Used by the client's tests and for running the client
//! without a backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use chatty_shared::PushEvent;

use crate::error::TransportError;
use crate::socket::{PushConnector, SocketHandle};

#[derive(Default)]
pub struct MemoryConnector {
    handles: Mutex<Vec<Arc<SocketHandle>>>,
    attempts: AtomicUsize,
    refuse: AtomicBool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connects fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `connect` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Handles that were successfully connected, oldest first.
    pub fn handles(&self) -> Vec<Arc<SocketHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_handle(&self) -> Option<Arc<SocketHandle>> {
        self.handles().pop()
    }

    /// Deliver `event` on the most recent connection as if the server sent it.
    pub fn push(&self, event: PushEvent) {
        if let Some(handle) = self.last_handle() {
            handle.dispatch(&event);
        }
    }

    /// Simulate the server dropping the most recent connection.
    pub fn drop_connection(&self) {
        if let Some(handle) = self.last_handle() {
            handle.mark_disconnected();
        }
    }
}

#[async_trait]
impl PushConnector for MemoryConnector {
    async fn connect(&self, handle: Arc<SocketHandle>) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Handshake("connection refused".into()));
        }

        handle.mark_connected();
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());
        debug!(user = %handle.user_id().short(), "memory connection opened");

        let mut shutdown = handle.shutdown_signal();
        tokio::spawn(async move {
            loop {
                let closing = *shutdown.borrow_and_update();
                if closing || shutdown.changed().await.is_err() {
                    break;
                }
            }
            handle.mark_disconnected();
        });

        Ok(())
    }
}
