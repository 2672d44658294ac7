//! The [`ChatClient`] façade: one place that wires the containers together
//! and sequences the flows that span more than one of them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chatty_net::{ChatApi, HttpApi, PushConnector, WsConnector};
use chatty_shared::{
    AuthUser, ChatUser, Credentials, Message, MessageContent, ProfileUpdate, SignupDetails, UserId,
};
use chatty_store::Database;

use crate::config::ClientConfig;
use crate::conversation::ConversationStore;
use crate::error::ClientError;
use crate::notifier::Notifier;
use crate::presence::PresenceTracker;
use crate::session::SessionManager;
use crate::theme::ThemeStore;
use crate::transport::TransportManager;

pub struct ChatClient {
    notifier: Notifier,
    presence: Arc<PresenceTracker>,
    transport: Arc<TransportManager>,
    session: SessionManager,
    conversation: ConversationStore,
    theme: ThemeStore,
}

impl ChatClient {
    pub fn new(api: Arc<dyn ChatApi>, connector: Arc<dyn PushConnector>, db: Database) -> Self {
        let notifier = Notifier::new();
        let presence = Arc::new(PresenceTracker::new());
        let transport = Arc::new(TransportManager::new(connector, presence.clone()));
        let session = SessionManager::new(api.clone(), transport.clone(), notifier.clone());
        let conversation = ConversationStore::new(api, transport.clone(), notifier.clone());
        let theme = ThemeStore::load(db);

        Self {
            notifier,
            presence,
            transport,
            session,
            conversation,
            theme,
        }
    }

    /// Build a client talking to the real backend described by `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = HttpApi::new(&config.api_url, config.request_timeout)
            .map_err(|e| ClientError::api(e.to_string()))?;
        let connector = WsConnector::new(config.socket_url.clone(), config.request_timeout);

        let dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => Database::default_dir()?,
        };
        let db = Database::open_in(&dir)?;

        info!(api = %config.api_url, socket = %config.socket_url, "client configured");
        Ok(Self::new(Arc::new(api), Arc::new(connector), db))
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn transport(&self) -> &TransportManager {
        &self.transport
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    /// Boot: restore the session from the server cookie and, if that worked,
    /// load the contact list.
    pub async fn start(&self) -> Option<AuthUser> {
        let user = self.session.check_auth().await.ok()?;
        self.load_contacts().await;
        Some(user)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthUser, ClientError> {
        let previous = self.session.identity().map(|u| u.id);
        let result = self.session.login(credentials).await;
        self.settle_identity(previous, result).await
    }

    pub async fn signup(&self, details: SignupDetails) -> Result<AuthUser, ClientError> {
        let previous = self.session.identity().map(|u| u.id);
        let result = self.session.signup(details).await;
        self.settle_identity(previous, result).await
    }

    /// Log out and forget the conversation state. Nothing is forgotten if the
    /// server refuses.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.session.logout().await?;
        self.conversation.reset();
        Ok(())
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ClientError> {
        self.session.update_profile(update).await
    }

    /// Add a contact, then refresh the list so it shows up.
    pub async fn add_contact(&self, username: &str) -> Result<(), ClientError> {
        self.session.add_contact(username).await?;
        self.load_contacts().await;
        Ok(())
    }

    /// Open the conversation with `peer`, or close the current one.
    pub async fn open_conversation(&self, peer: Option<ChatUser>) -> Result<(), ClientError> {
        self.conversation.switch_conversation(peer).await
    }

    pub async fn send(&self, content: MessageContent) -> Result<Message, ClientError> {
        self.conversation.send_message(content).await
    }

    /// Contacts for the sidebar, optionally restricted to those online.
    pub fn visible_contacts(&self, online_only: bool) -> Vec<ChatUser> {
        self.conversation.visible_contacts(online_only, &self.presence)
    }

    /// After a login or signup: drop the conversation state of whoever was
    /// signed in before, unless it is the same user again.
    async fn settle_identity(
        &self,
        previous: Option<UserId>,
        result: Result<AuthUser, ClientError>,
    ) -> Result<AuthUser, ClientError> {
        let switched = match (&previous, &result) {
            (None, _) => false,
            (Some(prev), Ok(user)) => *prev != user.id,
            (Some(_), Err(_)) => true,
        };
        if switched {
            info!("signed-in user changed, clearing conversation state");
            self.conversation.reset();
        }

        let user = result?;
        self.load_contacts().await;
        Ok(user)
    }

    async fn load_contacts(&self) {
        // Failure is already reported through the notifier and error slot.
        match self.conversation.fetch_contacts().await {
            Ok(contacts) => debug!(count = contacts.len(), "contact list refreshed"),
            Err(e) => warn!(error = %e, "contact list not refreshed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatty_net::MemoryConnector;
    use chatty_shared::{PushEvent, PushEventKind};

    use crate::session::SessionPhase;
    use crate::testing::{message, peer, user, FakeApi};

    fn client() -> (ChatClient, Arc<FakeApi>, Arc<MemoryConnector>) {
        let api = Arc::new(FakeApi::new());
        let connector = Arc::new(MemoryConnector::new());
        let client = ChatClient::new(
            api.clone(),
            connector.clone(),
            Database::open_in_memory().unwrap(),
        );
        (client, api, connector)
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "me@example.com".into(),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn test_start_restores_session_and_contacts() {
        let (client, api, _) = client();
        *api.contacts.lock().unwrap() = Ok(vec![peer("a")]);

        let user = client.start().await.unwrap();

        assert_eq!(user.id, UserId::from("me"));
        assert_eq!(client.session().phase(), SessionPhase::Authenticated);
        assert!(client.transport().is_connected());
        assert_eq!(client.conversation().contacts(), vec![peer("a")]);
    }

    #[tokio::test]
    async fn test_start_without_cookie_skips_contacts() {
        let (client, api, connector) = client();
        api.reject_auth(None);

        assert!(client.start().await.is_none());

        assert_eq!(client.session().phase(), SessionPhase::Unauthenticated);
        assert_eq!(api.calls("contacts"), 0);
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_full_conversation_flow() {
        let (client, api, connector) = client();
        *api.contacts.lock().unwrap() = Ok(vec![peer("a"), peer("b")]);
        api.set_history("a", vec![message("m1", "a", "me", "hey")]);

        client.login(&credentials()).await.unwrap();
        connector.push(PushEvent::OnlineUsers(vec![UserId::from("a")]));
        assert_eq!(client.visible_contacts(true), vec![peer("a")]);

        client.open_conversation(Some(peer("a"))).await.unwrap();
        client.send(MessageContent::text("hi back")).await.unwrap();
        connector.push(PushEvent::NewMessage(message("m2", "a", "me", "how are you")));

        let texts: Vec<String> = client
            .conversation()
            .messages()
            .into_iter()
            .filter_map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["hey", "hi back", "how are you"]);
    }

    #[tokio::test]
    async fn test_logout_resets_everything() {
        let (client, api, connector) = client();
        *api.contacts.lock().unwrap() = Ok(vec![peer("a")]);
        client.login(&credentials()).await.unwrap();
        client.open_conversation(Some(peer("a"))).await.unwrap();
        connector.push(PushEvent::OnlineUsers(vec![UserId::from("a")]));
        let handle = connector.last_handle().unwrap();

        client.logout().await.unwrap();

        assert!(client.session().identity().is_none());
        assert!(client.transport().handle().is_none());
        assert_eq!(client.presence().online_count(), 0);
        let state = client.conversation().snapshot();
        assert!(state.contacts.is_empty());
        assert!(state.selected.is_none());
        assert_eq!(handle.listener_count(PushEventKind::NewMessage), 0);
    }

    #[tokio::test]
    async fn test_login_as_another_user_starts_clean() {
        let (client, api, connector) = client();
        *api.contacts.lock().unwrap() = Ok(vec![peer("a")]);
        client.login(&credentials()).await.unwrap();
        client.open_conversation(Some(peer("a"))).await.unwrap();
        connector.push(PushEvent::OnlineUsers(vec![UserId::from("a")]));
        let first = client.transport().handle().unwrap();

        *api.auth.lock().unwrap() = Ok(user("other"));
        *api.contacts.lock().unwrap() = Ok(vec![peer("b")]);
        client.login(&credentials()).await.unwrap();

        let handle = client.transport().handle().unwrap();
        assert_eq!(handle.user_id(), &UserId::from("other"));
        assert!(first.is_closing());
        assert_eq!(first.listener_count(PushEventKind::NewMessage), 0);
        assert_eq!(connector.attempts(), 2);
        assert_eq!(client.presence().online_count(), 0);
        let state = client.conversation().snapshot();
        assert!(state.selected.is_none());
        assert!(state.messages.is_empty());
        assert_eq!(state.contacts, vec![peer("b")]);
        assert!(!client.conversation().is_subscribed());

        // A message for the first user's conversation goes nowhere.
        first.dispatch(&PushEvent::NewMessage(message("m1", "a", "me", "late")));
        assert!(client.conversation().messages().is_empty());
    }

    #[tokio::test]
    async fn test_relogin_as_same_user_keeps_conversation() {
        let (client, _, connector) = client();
        client.login(&credentials()).await.unwrap();
        client.open_conversation(Some(peer("a"))).await.unwrap();

        client.login(&credentials()).await.unwrap();

        assert_eq!(client.conversation().selected(), Some(peer("a")));
        assert!(client.conversation().is_subscribed());
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_relogin_clears_conversation() {
        let (client, api, _) = client();
        client.login(&credentials()).await.unwrap();
        client.open_conversation(Some(peer("a"))).await.unwrap();
        api.reject_auth(Some("Invalid credentials"));

        assert!(client.login(&credentials()).await.is_err());

        assert!(client.session().identity().is_none());
        assert!(client.transport().handle().is_none());
        assert!(client.conversation().selected().is_none());
        assert!(!client.conversation().is_subscribed());
    }

    #[tokio::test]
    async fn test_failed_logout_keeps_conversation() {
        let (client, api, _) = client();
        client.login(&credentials()).await.unwrap();
        client.open_conversation(Some(peer("a"))).await.unwrap();
        *api.logout.lock().unwrap() = Err(Some("Internal Server Error".into()));

        assert!(client.logout().await.is_err());

        assert!(client.session().identity().is_some());
        assert_eq!(client.conversation().selected(), Some(peer("a")));
        assert!(client.conversation().is_subscribed());
    }

    #[tokio::test]
    async fn test_add_contact_refreshes_list() {
        let (client, api, _) = client();
        client.login(&credentials()).await.unwrap();
        *api.contacts.lock().unwrap() = Ok(vec![peer("newbie")]);

        client.add_contact(" newbie ").await.unwrap();

        assert_eq!(api.calls("contacts"), 2);
        assert_eq!(client.conversation().contacts(), vec![peer("newbie")]);
    }

    #[tokio::test]
    async fn test_theme_is_reachable() {
        let (client, _, _) = client();
        assert_eq!(client.theme().theme(), "coffee");
        client.theme().set_theme("night").unwrap();
        assert_eq!(client.theme().theme(), "night");
    }
}
