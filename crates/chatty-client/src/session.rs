//! Authentication lifecycle.
//!
//! The [`SessionManager`] owns the identity of the local user. A successful
//! auth check, login or signup stores the identity and opens the push
//! connection; a successful logout clears it and closes the connection.
//! Every operation keeps its own busy flag and writes the single error slot.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use chatty_net::{ApiError, ChatApi};
use chatty_shared::color::random_dark_color;
use chatty_shared::constants::{
    FALLBACK_ADD_CONTACT, FALLBACK_CHECK_AUTH, FALLBACK_LOGIN, FALLBACK_LOGOUT, FALLBACK_SIGNUP,
    FALLBACK_UPDATE_PROFILE, NOTICE_CONTACT_ADDED, NOTICE_LOGGED_IN, NOTICE_LOGGED_OUT,
    NOTICE_PROFILE_UPDATED, NOTICE_SIGNED_UP,
};
use chatty_shared::{AddContactRequest, AuthUser, Credentials, ProfileUpdate, SignupDetails};

use crate::error::ClientError;
use crate::notifier::Notifier;
use crate::transport::TransportManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initial auth check still running.
    Checking,
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<AuthUser>,
    pub checking: bool,
    pub signing_up: bool,
    pub logging_in: bool,
    pub updating_profile: bool,
    /// Most recent failure; cleared by the next success.
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            checking: true,
            signing_up: false,
            logging_in: false,
            updating_profile: false,
            error: None,
        }
    }
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match (&self.identity, self.checking) {
            (Some(_), _) => SessionPhase::Authenticated,
            (None, true) => SessionPhase::Checking,
            (None, false) => SessionPhase::Unauthenticated,
        }
    }

    /// Still waiting on the first auth check with nobody signed in.
    pub fn is_booting(&self) -> bool {
        self.checking && self.identity.is_none()
    }
}

type Flag = fn(&mut SessionState) -> &mut bool;

fn signing_up(s: &mut SessionState) -> &mut bool {
    &mut s.signing_up
}

fn logging_in(s: &mut SessionState) -> &mut bool {
    &mut s.logging_in
}

pub struct SessionManager {
    api: Arc<dyn ChatApi>,
    transport: Arc<TransportManager>,
    notifier: Notifier,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn ChatApi>, transport: Arc<TransportManager>, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            api,
            transport,
            notifier,
            state,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<AuthUser> {
        self.state.borrow().identity.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn is_booting(&self) -> bool {
        self.state.borrow().is_booting()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Resume an existing server session, if the cookie is still valid.
    pub async fn check_auth(&self) -> Result<AuthUser, ClientError> {
        self.state.send_modify(|s| {
            s.checking = true;
            s.error = None;
        });

        match self.api.check_auth().await {
            Ok(user) => {
                info!(user = %user.id.short(), "session restored");
                self.state.send_modify(|s| {
                    s.identity = Some(user.clone());
                    s.error = None;
                    s.checking = false;
                });
                self.open_transport(&user).await;
                Ok(user)
            }
            Err(e) => {
                let message = e.message_or(FALLBACK_CHECK_AUTH);
                debug!(error = %e, "no active session");
                self.state.send_modify(|s| {
                    s.identity = None;
                    s.error = Some(message.clone());
                    s.checking = false;
                });
                self.transport.disconnect();
                Err(ClientError::api(message))
            }
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthUser, ClientError> {
        self.establish(
            logging_in,
            FALLBACK_LOGIN,
            NOTICE_LOGGED_IN,
            self.api.login(credentials),
        )
        .await
    }

    /// Create an account. A random dark avatar color is assigned when the
    /// caller did not pick one.
    pub async fn signup(&self, mut details: SignupDetails) -> Result<AuthUser, ClientError> {
        if details.color.is_none() {
            details.color = Some(random_dark_color());
        }
        self.establish(
            signing_up,
            FALLBACK_SIGNUP,
            NOTICE_SIGNED_UP,
            self.api.signup(&details),
        )
        .await
    }

    /// End the server session. On failure the identity and the connection
    /// are left as they were.
    pub async fn logout(&self) -> Result<(), ClientError> {
        match self.api.logout().await {
            Ok(()) => {
                self.state.send_modify(|s| {
                    s.identity = None;
                    s.error = None;
                });
                self.notifier.success(NOTICE_LOGGED_OUT);
                self.transport.disconnect();
                info!("logged out");
                Ok(())
            }
            Err(e) => Err(self.fail(&e, FALLBACK_LOGOUT)),
        }
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ClientError> {
        self.state.send_modify(|s| {
            s.updating_profile = true;
            s.error = None;
        });

        let result = self.api.update_profile(update).await;
        self.state.send_modify(|s| s.updating_profile = false);

        match result {
            Ok(user) => {
                self.state.send_modify(|s| s.identity = Some(user.clone()));
                self.notifier.success(NOTICE_PROFILE_UPDATED);
                Ok(user)
            }
            Err(e) => Err(self.fail(&e, FALLBACK_UPDATE_PROFILE)),
        }
    }

    /// Add `username` to the signed-in user's contacts.
    pub async fn add_contact(&self, username: &str) -> Result<(), ClientError> {
        let Some(me) = self.identity() else {
            let err = ClientError::NotAuthenticated;
            self.state.send_modify(|s| s.error = Some(err.to_string()));
            self.notifier.error(err.to_string());
            return Err(err);
        };

        let request = AddContactRequest {
            user_id: me.id,
            contact_username: username.trim().to_string(),
        };
        match self.api.add_contact(&request).await {
            Ok(()) => {
                self.state.send_modify(|s| s.error = None);
                self.notifier.success(NOTICE_CONTACT_ADDED);
                Ok(())
            }
            Err(e) => Err(self.fail(&e, FALLBACK_ADD_CONTACT)),
        }
    }

    // Shared by login and signup.
    async fn establish<F>(
        &self,
        flag: Flag,
        fallback: &str,
        notice: &str,
        request: F,
    ) -> Result<AuthUser, ClientError>
    where
        F: Future<Output = Result<AuthUser, ApiError>>,
    {
        self.state.send_modify(|s| {
            *flag(s) = true;
            s.error = None;
        });

        match request.await {
            Ok(user) => {
                info!(user = %user.id.short(), "authenticated");
                self.state.send_modify(|s| {
                    *flag(s) = false;
                    s.identity = Some(user.clone());
                    s.error = None;
                });
                self.notifier.success(notice);
                self.open_transport(&user).await;
                Ok(user)
            }
            Err(e) => {
                let message = e.message_or(fallback);
                warn!(error = %e, "authentication failed");
                self.state.send_modify(|s| {
                    *flag(s) = false;
                    s.identity = None;
                    s.error = Some(message.clone());
                });
                // No identity, so no connection may stay behind.
                self.transport.disconnect();
                self.notifier.error(message.clone());
                Err(ClientError::api(message))
            }
        }
    }

    fn fail(&self, e: &ApiError, fallback: &str) -> ClientError {
        let message = e.message_or(fallback);
        warn!(error = %e, "{fallback}");
        self.state.send_modify(|s| s.error = Some(message.clone()));
        self.notifier.error(message.clone());
        ClientError::api(message)
    }

    async fn open_transport(&self, user: &AuthUser) {
        if let Err(e) = self.transport.connect(Some(user)).await {
            warn!(error = %e, "continuing without live updates");
        }
    }
}
