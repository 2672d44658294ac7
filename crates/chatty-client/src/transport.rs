//! Push connection lifecycle.
//!
//! The [`TransportManager`] is the only place that creates or destroys the
//! [`SocketHandle`]. It opens the connection when a session becomes
//! authenticated, tears it down on logout, and lends the handle to consumers
//! that want to attach their own listeners.
//!
//! Two listeners are attached to every handle it opens:
//! - roster snapshots go straight into the [`PresenceTracker`];
//! - a dropped connection clears presence and forgets the handle, so the
//!   next `connect` starts fresh.
//!
//! Both ignore events from a handle that is no longer the current one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use chatty_net::{PushConnector, SocketHandle, TransportError};
use chatty_shared::{AuthUser, PushEvent, PushEventKind};

use crate::presence::PresenceTracker;

type Slot = Mutex<Option<Arc<SocketHandle>>>;

pub struct TransportManager {
    connector: Arc<dyn PushConnector>,
    presence: Arc<PresenceTracker>,
    slot: Arc<Slot>,
    /// Serializes concurrent `connect` calls.
    opening: tokio::sync::Mutex<()>,
}

impl TransportManager {
    pub fn new(connector: Arc<dyn PushConnector>, presence: Arc<PresenceTracker>) -> Self {
        Self {
            connector,
            presence,
            slot: Arc::new(Mutex::new(None)),
            opening: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the push connection for `identity`.
    ///
    /// Returns `Ok(false)` without doing anything when there is no identity
    /// or a live connection already exists.
    pub async fn connect(&self, identity: Option<&AuthUser>) -> Result<bool, TransportError> {
        let Some(user) = identity else {
            debug!("no identity, push connection not opened");
            return Ok(false);
        };

        let _opening = self.opening.lock().await;

        if let Some(existing) = self.handle() {
            let same_user = existing.user_id() == &user.id;
            if same_user && existing.is_connected() {
                debug!(user = %user.id.short(), "push connection already open");
                return Ok(false);
            }
            if !same_user {
                info!(
                    previous = %existing.user_id().short(),
                    user = %user.id.short(),
                    "replacing push connection of another user"
                );
            }
            // Either another identity's or one that never came up.
            self.retire(&existing);
        }

        let handle = SocketHandle::new(user.id.clone());
        self.attach_lifecycle_listeners(&handle);
        *lock(&self.slot) = Some(handle.clone());

        if let Err(e) = self.connector.connect(handle.clone()).await {
            warn!(user = %user.id.short(), error = %e, "push connection failed");
            handle.close();
            take_if_current(&self.slot, Arc::as_ptr(&handle));
            return Err(e);
        }

        if !is_current(&self.slot, Arc::as_ptr(&handle)) {
            // Disconnected while the handshake was in flight.
            debug!(user = %user.id.short(), "push connection superseded during handshake");
            handle.close();
            return Ok(false);
        }

        info!(user = %user.id.short(), "push connection ready");
        Ok(true)
    }

    /// Close the push connection and clear presence. Message listeners are
    /// detached before the handle closes. No-op without one.
    pub fn disconnect(&self) {
        let taken = lock(&self.slot).take();
        let Some(handle) = taken else {
            debug!("no push connection to close");
            self.presence.clear();
            return;
        };

        handle.off_kind(PushEventKind::NewMessage);
        handle.close();
        self.presence.clear();
        info!(user = %handle.user_id().short(), "push connection closed");
    }

    /// Borrow the current handle, if any.
    pub fn handle(&self) -> Option<Arc<SocketHandle>> {
        lock(&self.slot).clone()
    }

    pub fn is_connected(&self) -> bool {
        self.handle().is_some_and(|h| h.is_connected())
    }

    /// Detach consumer listeners, close `handle` and forget it.
    fn retire(&self, handle: &Arc<SocketHandle>) {
        handle.off_kind(PushEventKind::NewMessage);
        handle.close();
        take_if_current(&self.slot, Arc::as_ptr(handle));
        self.presence.clear();
    }

    fn attach_lifecycle_listeners(&self, handle: &Arc<SocketHandle>) {
        let me = Arc::downgrade(handle);
        let slot = Arc::downgrade(&self.slot);
        let presence = self.presence.clone();
        handle.on(PushEventKind::OnlineUsers, move |event| {
            let PushEvent::OnlineUsers(ids) = event else {
                return;
            };
            if !upgrade_is_current(&slot, &me) {
                debug!("ignoring roster from a stale connection");
                return;
            }
            presence.replace_all(ids.iter().cloned());
        });

        let me = Arc::downgrade(handle);
        let slot = Arc::downgrade(&self.slot);
        let presence = self.presence.clone();
        handle.on(PushEventKind::Disconnect, move |_| {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            if take_if_current(&slot, me.as_ptr()) {
                presence.clear();
                warn!("push connection lost");
            }
        });
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Arc<SocketHandle>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_current(slot: &Slot, handle: *const SocketHandle) -> bool {
    lock(slot)
        .as_ref()
        .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), handle))
}

fn upgrade_is_current(slot: &Weak<Slot>, me: &Weak<SocketHandle>) -> bool {
    slot.upgrade()
        .is_some_and(|slot| is_current(&slot, me.as_ptr()))
}

/// Drop the stored handle if it is `handle`. Returns whether it was.
fn take_if_current(slot: &Slot, handle: *const SocketHandle) -> bool {
    let mut guard = lock(slot);
    let current = guard
        .as_ref()
        .is_some_and(|h| std::ptr::eq(Arc::as_ptr(h), handle));
    if current {
        guard.take();
    }
    current
}
