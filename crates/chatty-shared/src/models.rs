//! Domain model structs exchanged with the Chatty backend.
//!
//! Field names follow the backend's JSON (`_id`, camelCase) so every struct
//! can be handed to `serde_json` directly.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{MessageId, UserId};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated end-user, as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Profile image reference (URL or data URL). Empty when unset.
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_pic: String,
    /// Avatar background color assigned at signup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl AuthUser {
    /// Avatar placeholder letter.
    pub fn initial(&self) -> Option<char> {
        self.full_name.as_deref().and_then(initial_of)
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// Another user reachable for messaging (an entry of the contact list).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_pic: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
}

impl ChatUser {
    /// Avatar placeholder letter: first character of the trimmed full name,
    /// uppercased. `None` when the name is blank.
    pub fn initial(&self) -> Option<char> {
        initial_of(&self.full_name)
    }
}

fn initial_of(name: &str) -> Option<char> {
    name.trim().chars().next().and_then(|c| c.to_uppercase().next())
}

/// The backend sends `null` for fields it never filled in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single direct message between two users.
///
/// At least one of `text` / `image` is expected to be present; the backend
/// enforces this, not the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Whether `peer` is either end of this message.
    pub fn involves(&self, peer: &UserId) -> bool {
        &self.sender_id == peer || &self.receiver_id == peer
    }

    /// Whether the message was sent by `self_id`.
    pub fn is_outgoing(&self, self_id: &UserId) -> bool {
        &self.sender_id == self_id
    }

    /// Creation time as a local `HH:MM` label.
    pub fn time_label(&self) -> String {
        self.created_at.with_timezone(&Local).format("%H:%M").to_string()
    }
}

/// Body of `POST /messages/send/{peerId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty) && self.image.is_none()
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupDetails {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    /// Avatar color; a random dark color is assigned when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Body of `PUT /auth/update-profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Body of `POST /auth/add-contact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    pub user_id: UserId,
    pub contact_username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_backend_json() {
        let json = r#"{
            "_id": "m1",
            "senderId": "peer1",
            "receiverId": "me",
            "text": "hello",
            "createdAt": "2024-05-01T10:15:00.000Z",
            "updatedAt": "2024-05-01T10:15:00.000Z",
            "__v": 0
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, MessageId::from("m1"));
        assert_eq!(msg.sender_id, UserId::from("peer1"));
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert!(msg.image.is_none());
        assert!(msg.involves(&UserId::from("me")));
        assert!(!msg.involves(&UserId::from("someone-else")));
        assert!(!msg.is_outgoing(&UserId::from("me")));
    }

    #[test]
    fn test_time_label_shape() {
        let json = r#"{"_id":"m1","senderId":"a","receiverId":"b","image":"data:x",
            "createdAt":"2024-05-01T10:15:00Z","updatedAt":"2024-05-01T10:15:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let label = msg.time_label();
        assert_eq!(label.len(), 5);
        assert_eq!(label.as_bytes()[2], b':');
    }

    #[test]
    fn test_auth_user_optional_fields() {
        let json = r#"{"_id":"u1","username":"ada","email":"ada@example.com","profilePic":""}"#;
        let user: AuthUser = serde_json::from_str(json).unwrap();
        assert!(user.full_name.is_none());
        assert!(user.color.is_none());
        assert_eq!(user.initial(), None);
    }

    #[test]
    fn test_chat_user_tolerates_null_fields() {
        let json = r#"[
            {"_id":"u1","username":"ada","fullName":null,"profilePic":null,"color":null},
            {"_id":"u2","username":"bob"}
        ]"#;
        let users: Vec<ChatUser> = serde_json::from_str(json).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].full_name, "");
        assert_eq!(users[0].color, "");
        assert_eq!(users[1].profile_pic, "");

        let json = r#"{"_id":"u1","username":"ada","email":"a@x.io","profilePic":null}"#;
        let me: AuthUser = serde_json::from_str(json).unwrap();
        assert_eq!(me.profile_pic, "");
    }

    #[test]
    fn test_chat_user_initial() {
        let user = ChatUser {
            id: UserId::from("u2"),
            username: "bob".into(),
            full_name: "  bob builder".into(),
            profile_pic: String::new(),
            color: "#7f3123".into(),
        };
        assert_eq!(user.initial(), Some('B'));
    }

    #[test]
    fn test_message_content_skips_absent_fields() {
        let body = serde_json::to_value(MessageContent::text("hi")).unwrap();
        assert_eq!(body, serde_json::json!({ "text": "hi" }));
        assert!(MessageContent::default().is_empty());
        assert!(!MessageContent::default().with_image("data:x").is_empty());
    }

    #[test]
    fn test_add_contact_body_is_camel_case() {
        let body = serde_json::to_value(AddContactRequest {
            user_id: UserId::from("u1"),
            contact_username: "johndoe123".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "userId": "u1", "contactUsername": "johndoe123" })
        );
    }
}
