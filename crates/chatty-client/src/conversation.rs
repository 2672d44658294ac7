//! Contacts, the open conversation and its message history.
//!
//! All state lives in one [`ConversationState`] snapshot, mutated only
//! through `send_modify`, so observers never see a selection change without
//! the matching message-list reset.
//!
//! Responses that arrive after the user moved on are dropped. Each selection
//! change (and each [`reset`](ConversationStore::reset)) bumps a generation
//! counter; a history fetch or a send only lands if the generation it
//! started under is still current. `loading_messages` is owned by the most
//! recently issued history fetch.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use chatty_net::{ChatApi, ListenerId, SocketHandle};
use chatty_shared::constants::{FALLBACK_FETCH_MESSAGES, FALLBACK_FETCH_USERS, FALLBACK_SEND_MESSAGE};
use chatty_shared::{ChatUser, Message, MessageContent, PushEvent, PushEventKind, UserId};

use crate::error::ClientError;
use crate::notifier::Notifier;
use crate::presence::PresenceTracker;
use crate::transport::TransportManager;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub contacts: Vec<ChatUser>,
    pub selected: Option<ChatUser>,
    /// History of the selected conversation, in arrival order.
    pub messages: Vec<Message>,
    pub loading_users: bool,
    pub loading_messages: bool,
    pub sending: bool,
    pub error: Option<String>,
    generation: u64,
    contacts_epoch: u64,
    latest_fetch: u64,
}

impl ConversationState {
    pub fn selected_id(&self) -> Option<&UserId> {
        self.selected.as_ref().map(|peer| &peer.id)
    }
}

struct Subscription {
    handle: Weak<SocketHandle>,
    listener: ListenerId,
    peer: UserId,
}

pub struct ConversationStore {
    api: Arc<dyn ChatApi>,
    transport: Arc<TransportManager>,
    notifier: Notifier,
    state: Arc<watch::Sender<ConversationState>>,
    subscription: Mutex<Option<Subscription>>,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn ChatApi>, transport: Arc<TransportManager>, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(ConversationState::default());
        Self {
            api,
            transport,
            notifier,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    pub fn selected(&self) -> Option<ChatUser> {
        self.state.borrow().selected.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn contacts(&self) -> Vec<ChatUser> {
        self.state.borrow().contacts.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Contacts to show in the sidebar, optionally only those online.
    pub fn visible_contacts(&self, online_only: bool, presence: &PresenceTracker) -> Vec<ChatUser> {
        self.state
            .borrow()
            .contacts
            .iter()
            .filter(|c| !online_only || presence.is_online(&c.id))
            .cloned()
            .collect()
    }

    /// Look a contact up by id or username.
    pub fn find_contact(&self, key: &str) -> Option<ChatUser> {
        self.state
            .borrow()
            .contacts
            .iter()
            .find(|c| c.id.as_str() == key || c.username.eq_ignore_ascii_case(key))
            .cloned()
    }

    // -- REST-backed operations ---------------------------------------------

    pub async fn fetch_contacts(&self) -> Result<Vec<ChatUser>, ClientError> {
        let epoch = modify(&self.state, |s| {
            s.loading_users = true;
            s.error = None;
            s.contacts_epoch
        });

        let result = self.api.contacts().await;

        match result {
            Ok(contacts) => {
                self.state.send_modify(|s| {
                    s.loading_users = false;
                    if s.contacts_epoch == epoch {
                        s.contacts = contacts.clone();
                        s.error = None;
                    } else {
                        debug!("dropping contact list fetched before reset");
                    }
                });
                debug!(count = contacts.len(), "contacts loaded");
                Ok(contacts)
            }
            Err(e) => {
                let message = e.message_or(FALLBACK_FETCH_USERS);
                warn!(error = %e, "failed to fetch contacts");
                self.state.send_modify(|s| {
                    s.loading_users = false;
                    s.error = Some(message.clone());
                });
                self.notifier.error(message.clone());
                Err(ClientError::api(message))
            }
        }
    }

    /// Load the history with `peer`.
    ///
    /// The returned list is what the server sent; it only replaces the
    /// visible history if the selection did not change in the meantime.
    pub async fn fetch_messages(&self, peer: &UserId) -> Result<Vec<Message>, ClientError> {
        let (generation, ticket) = modify(&self.state, |s| {
            s.latest_fetch += 1;
            s.loading_messages = true;
            s.error = None;
            (s.generation, s.latest_fetch)
        });

        let result = self.api.messages(peer).await;

        let mut applied = false;
        self.state.send_modify(|s| {
            if s.latest_fetch == ticket {
                s.loading_messages = false;
            }
            if s.generation != generation {
                return;
            }
            applied = true;
            match &result {
                Ok(messages) => {
                    s.messages = messages.clone();
                    s.error = None;
                }
                Err(e) => s.error = Some(e.message_or(FALLBACK_FETCH_MESSAGES)),
            }
        });

        match result {
            Ok(messages) => {
                if applied {
                    debug!(peer = %peer.short(), count = messages.len(), "history loaded");
                } else {
                    info!(peer = %peer.short(), "discarding history for a conversation no longer open");
                }
                Ok(messages)
            }
            Err(e) => {
                let message = e.message_or(FALLBACK_FETCH_MESSAGES);
                warn!(peer = %peer.short(), error = %e, "failed to fetch history");
                if applied {
                    self.notifier.error(message.clone());
                }
                Err(ClientError::api(message))
            }
        }
    }

    /// Send to the selected peer and append the server's echo.
    pub async fn send_message(&self, content: MessageContent) -> Result<Message, ClientError> {
        let (peer, generation) = {
            let state = self.state.borrow();
            (state.selected_id().cloned(), state.generation)
        };
        let Some(peer) = peer else {
            let err = ClientError::NoPeerSelected;
            self.state.send_modify(|s| s.error = Some(err.to_string()));
            self.notifier.error(err.to_string());
            return Err(err);
        };

        self.state.send_modify(|s| {
            s.sending = true;
            s.error = None;
        });

        let result = self.api.send_message(&peer, &content).await;

        match result {
            Ok(message) => {
                self.state.send_modify(|s| {
                    s.sending = false;
                    if s.generation == generation {
                        s.messages.push(message.clone());
                        s.error = None;
                    }
                });
                debug!(peer = %peer.short(), id = %message.id, "message sent");
                Ok(message)
            }
            Err(e) => {
                let message = e.message_or(FALLBACK_SEND_MESSAGE);
                warn!(peer = %peer.short(), error = %e, "failed to send message");
                self.state.send_modify(|s| {
                    s.sending = false;
                    s.error = Some(message.clone());
                });
                self.notifier.error(message.clone());
                Err(ClientError::api(message))
            }
        }
    }

    // -- selection and live updates -----------------------------------------

    /// Change the selected peer. The history is cleared in the same update.
    pub fn select_peer(&self, peer: Option<ChatUser>) {
        if let Some(peer) = &peer {
            debug!(peer = %peer.id.short(), "conversation selected");
        }
        self.state.send_modify(|s| {
            s.selected = peer;
            s.messages.clear();
            s.error = None;
            s.generation += 1;
        });
    }

    /// Attach the live-message listener for the selected peer.
    ///
    /// Does nothing without a push connection or a selection. Any previous
    /// listener is removed first, so at most one is ever attached.
    pub fn subscribe_messages(&self) -> bool {
        let Some(handle) = self.transport.handle() else {
            debug!("no push connection, not subscribing to messages");
            return false;
        };
        let Some(peer) = self.state.borrow().selected_id().cloned() else {
            debug!("no conversation selected, not subscribing to messages");
            return false;
        };

        self.unsubscribe_messages();

        let state = Arc::downgrade(&self.state);
        let target = peer.clone();
        let listener = handle.on(PushEventKind::NewMessage, move |event| {
            let PushEvent::NewMessage(message) = event else {
                return;
            };
            if !message.involves(&target) {
                return;
            }
            if let Some(state) = state.upgrade() {
                state.send_modify(|s| {
                    s.messages.push(message.clone());
                    s.error = None;
                });
            }
        });

        *self.lock_subscription() = Some(Subscription {
            handle: Arc::downgrade(&handle),
            listener,
            peer: peer.clone(),
        });
        debug!(peer = %peer.short(), "subscribed to live messages");
        true
    }

    /// Detach the live-message listener, if one is attached.
    pub fn unsubscribe_messages(&self) {
        let Some(sub) = self.lock_subscription().take() else {
            return;
        };
        if let Some(handle) = sub.handle.upgrade() {
            handle.off(sub.listener);
        }
        debug!(peer = %sub.peer.short(), "unsubscribed from live messages");
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock_subscription().is_some()
    }

    /// Open a conversation with `peer` (or close the current one): detach,
    /// select, re-attach, then load the history.
    pub async fn switch_conversation(&self, peer: Option<ChatUser>) -> Result<(), ClientError> {
        self.unsubscribe_messages();
        let peer_id = peer.as_ref().map(|p| p.id.clone());
        self.select_peer(peer);

        let Some(peer_id) = peer_id else {
            return Ok(());
        };
        self.subscribe_messages();
        self.fetch_messages(&peer_id).await.map(|_| ())
    }

    /// Forget everything, e.g. after logout.
    pub fn reset(&self) {
        self.unsubscribe_messages();
        self.state.send_modify(|s| {
            *s = ConversationState {
                generation: s.generation + 1,
                contacts_epoch: s.contacts_epoch + 1,
                latest_fetch: s.latest_fetch,
                ..ConversationState::default()
            };
        });
        debug!("conversation state reset");
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// `send_modify` that hands back a value computed under the same update.
fn modify<T, R>(state: &watch::Sender<T>, f: impl FnOnce(&mut T) -> R) -> R {
    let mut out = None;
    state.send_modify(|s| out = Some(f(s)));
    match out {
        Some(out) => out,
        None => unreachable!("send_modify always runs its closure"),
    }
}
