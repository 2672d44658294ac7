//! Scripted [`ChatApi`] and fixtures for the core's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use chatty_net::{ApiError, ChatApi};
use chatty_shared::{
    AddContactRequest, AuthUser, ChatUser, Credentials, Message, MessageContent, MessageId,
    ProfileUpdate, SignupDetails, UserId,
};

pub fn user(id: &str) -> AuthUser {
    AuthUser {
        id: UserId::from(id),
        username: id.to_string(),
        email: format!("{id}@example.com"),
        full_name: Some(format!("{id} tester")),
        profile_pic: String::new(),
        color: Some("#803224".into()),
    }
}

pub fn peer(id: &str) -> ChatUser {
    ChatUser {
        id: UserId::from(id),
        username: id.to_string(),
        full_name: format!("{id} peer"),
        profile_pic: String::new(),
        color: "#234159".into(),
    }
}

pub fn message(id: &str, from: &str, to: &str, text: &str) -> Message {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
    Message {
        id: MessageId::from(id),
        sender_id: UserId::from(from),
        receiver_id: UserId::from(to),
        text: Some(text.to_string()),
        image: None,
        created_at: at,
        updated_at: at,
    }
}

/// `Err(Some(msg))` rejects with a message body, `Err(None)` without one.
type Canned<T> = Mutex<Result<T, Option<String>>>;

fn answer<T: Clone>(canned: &Canned<T>) -> Result<T, ApiError> {
    canned
        .lock()
        .unwrap()
        .clone()
        .map_err(|message| ApiError::Rejected {
            status: 400,
            message,
        })
}

pub struct FakeApi {
    pub self_id: UserId,
    pub auth: Canned<AuthUser>,
    pub logout: Canned<()>,
    pub profile: Canned<AuthUser>,
    pub add_contact: Canned<()>,
    pub contacts: Canned<Vec<ChatUser>>,
    pub send: Canned<()>,
    /// History per peer; peers without an entry get an empty list.
    pub history: Mutex<HashMap<UserId, Result<Vec<Message>, Option<String>>>>,
    /// `messages(peer)` waits on the gate before answering.
    pub gates: Mutex<HashMap<UserId, Arc<Notify>>>,
    /// Same for whole operations, keyed by call name.
    op_gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
    pub last_add_contact: Mutex<Option<AddContactRequest>>,
    pub last_signup: Mutex<Option<SignupDetails>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    sent: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            self_id: UserId::from("me"),
            auth: Mutex::new(Ok(user("me"))),
            logout: Mutex::new(Ok(())),
            profile: Mutex::new(Ok(user("me"))),
            add_contact: Mutex::new(Ok(())),
            contacts: Mutex::new(Ok(Vec::new())),
            send: Mutex::new(Ok(())),
            history: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            op_gates: Mutex::new(HashMap::new()),
            last_add_contact: Mutex::new(None),
            last_signup: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
            sent: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn reject_auth(&self, message: Option<&str>) {
        *self.auth.lock().unwrap() = Err(message.map(str::to_string));
    }

    pub fn set_history(&self, peer: &str, messages: Vec<Message>) {
        self.history
            .lock()
            .unwrap()
            .insert(UserId::from(peer), Ok(messages));
    }

    /// Hold `messages(peer)` until the returned gate is notified.
    pub fn gate_history(&self, peer: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(UserId::from(peer), gate.clone());
        gate
    }

    /// Hold every `op` call until the returned gate is notified.
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.op_gates.lock().unwrap().insert(op, gate.clone());
        gate
    }

    async fn record(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        let gate = self.op_gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn check_auth(&self) -> Result<AuthUser, ApiError> {
        self.record("check_auth").await;
        answer(&self.auth)
    }

    async fn signup(&self, details: &SignupDetails) -> Result<AuthUser, ApiError> {
        self.record("signup").await;
        *self.last_signup.lock().unwrap() = Some(details.clone());
        answer(&self.auth)
    }

    async fn login(&self, _credentials: &Credentials) -> Result<AuthUser, ApiError> {
        self.record("login").await;
        answer(&self.auth)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.record("logout").await;
        answer(&self.logout)
    }

    async fn update_profile(&self, _update: &ProfileUpdate) -> Result<AuthUser, ApiError> {
        self.record("update_profile").await;
        answer(&self.profile)
    }

    async fn add_contact(&self, request: &AddContactRequest) -> Result<(), ApiError> {
        self.record("add_contact").await;
        *self.last_add_contact.lock().unwrap() = Some(request.clone());
        answer(&self.add_contact)
    }

    async fn contacts(&self) -> Result<Vec<ChatUser>, ApiError> {
        self.record("contacts").await;
        answer(&self.contacts)
    }

    async fn messages(&self, peer: &UserId) -> Result<Vec<Message>, ApiError> {
        self.record("messages").await;
        let gate = self.gates.lock().unwrap().get(peer).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let history = self.history.lock().unwrap().get(peer).cloned();
        history
            .unwrap_or(Ok(Vec::new()))
            .map_err(|message| ApiError::Rejected {
                status: 400,
                message,
            })
    }

    async fn send_message(
        &self,
        peer: &UserId,
        content: &MessageContent,
    ) -> Result<Message, ApiError> {
        self.record("send_message").await;
        answer(&self.send)?;
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let mut echo = message(
            &format!("sent-{n}"),
            self.self_id.as_str(),
            peer.as_str(),
            content.text.as_deref().unwrap_or_default(),
        );
        echo.text = content.text.clone();
        echo.image = content.image.clone();
        Ok(echo)
    }
}
