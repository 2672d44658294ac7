//! Push connection handle and listener registry.
//!
//! A [`SocketHandle`] is created by whoever owns the connection lifecycle,
//! given its listeners, and then handed to a [`PushConnector`] which drives
//! the actual I/O in a background task. The handle is shared through `Arc`
//! only; it is never cloned or serialized.
//!
//! The driver side talks back to the handle with [`SocketHandle::dispatch`]
//! and [`SocketHandle::mark_disconnected`], and watches
//! [`SocketHandle::shutdown_signal`] for local close requests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use chatty_shared::{PushEvent, PushEventKind, UserId};

use crate::error::TransportError;

/// Callback invoked for every delivered event of the registered kind.
pub type Listener = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Opaque token returned by [`SocketHandle::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: PushEventKind,
    listener: Listener,
}

pub struct SocketHandle {
    user_id: UserId,
    connected: AtomicBool,
    finished: AtomicBool,
    next_listener: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
    shutdown: watch::Sender<bool>,
}

impl SocketHandle {
    /// New, not yet connected handle for `user_id`.
    pub fn new(user_id: UserId) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            user_id,
            connected: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            next_listener: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            shutdown,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // -- listeners ---------------------------------------------------------

    /// Register `listener` for events of `kind`.
    pub fn on<F>(&self, kind: PushEventKind, listener: F) -> ListenerId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.registry().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        debug!(user = %self.user_id.short(), event = %kind, "listener attached");
        id
    }

    /// Remove one listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|r| r.id != id);
        before != registry.len()
    }

    /// Remove every listener of `kind`, returning how many were removed.
    pub fn off_kind(&self, kind: PushEventKind) -> usize {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|r| r.kind != kind);
        before - registry.len()
    }

    pub fn listener_count(&self, kind: PushEventKind) -> usize {
        self.registry().iter().filter(|r| r.kind == kind).count()
    }

    // -- lifecycle ---------------------------------------------------------

    /// Ask the driver to close the connection. Idempotent.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!(user = %self.user_id.short(), "closing push connection");
        }
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_closing(&self) -> bool {
        *self.shutdown.borrow()
    }

    // -- driver side -------------------------------------------------------

    /// Receiver that flips to `true` once [`close`](Self::close) is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Mark the connection as gone and deliver `Disconnect` exactly once.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        if !self.finished.swap(true, Ordering::AcqRel) {
            self.dispatch(&PushEvent::Disconnect);
        }
    }

    /// Deliver `event` to every listener registered for its kind.
    ///
    /// Listeners are called outside the registry lock, so they may attach
    /// or detach listeners themselves.
    pub fn dispatch(&self, event: &PushEvent) {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .registry()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.listener.clone())
            .collect();

        debug!(event = %kind, listeners = targets.len(), "dispatching push event");
        for listener in targets {
            listener(event);
        }
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("user_id", &self.user_id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Something that can bring a [`SocketHandle`] online.
///
/// On success the handle is connected and a background task keeps feeding
/// it events until the connection drops or the handle is closed, at which
/// point the task calls [`SocketHandle::mark_disconnected`].
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, handle: Arc<SocketHandle>) -> Result<(), TransportError>;
}
