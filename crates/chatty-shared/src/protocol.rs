//! Push transport wire format.
//!
//! The backend speaks Socket.IO v4 over a WebSocket. Every text frame is an
//! Engine.IO packet; Engine.IO `message` packets carry a Socket.IO packet,
//! which in turn carries named events with a JSON payload. Only the subset a
//! receive-only client needs is modelled here: no binary attachments, no
//! acknowledgements, default namespace only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{EVENT_DISCONNECT, EVENT_NEW_MESSAGE, EVENT_ONLINE_USERS};
use crate::error::ProtocolError;
use crate::models::Message;
use crate::types::UserId;

// ---------------------------------------------------------------------------
// Engine.IO
// ---------------------------------------------------------------------------

/// Handshake data sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

/// A single Engine.IO packet (one WebSocket text frame).
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Parse a WebSocket text frame.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let kind = frame.chars().next().ok_or(ProtocolError::Empty)?;
        let body = &frame[kind.len_utf8()..];
        let data = (!body.is_empty()).then(|| body.to_string());

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(data)),
            '3' => Ok(Self::Pong(data)),
            '4' => Ok(Self::Message(SocketPacket::parse(body)?)),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }

    /// Encode into a WebSocket text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let frame = match self {
            Self::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{}", data.as_deref().unwrap_or_default()),
            Self::Pong(data) => format!("3{}", data.as_deref().unwrap_or_default()),
            Self::Message(packet) => format!("4{}", packet.encode()?),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        };
        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// Socket.IO
// ---------------------------------------------------------------------------

/// A Socket.IO packet carried inside an Engine.IO `message`.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect (client → server) or connect confirmation.
    Connect(Option<Value>),
    Disconnect,
    /// Named event; `payload` is the first argument (`null` if none).
    Event { name: String, payload: Value },
    ConnectError(Value),
}

impl SocketPacket {
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        let kind = body.chars().next().ok_or(ProtocolError::Empty)?;
        let mut rest = &body[kind.len_utf8()..];

        // Skip a non-default namespace ("/admin,").
        if rest.starts_with('/') {
            rest = rest.find(',').map_or("", |i| &rest[i + 1..]);
        }

        // Skip an acknowledgement id.
        let ack_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest = &rest[ack_len..];

        match kind {
            '0' => {
                let data = if rest.is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(rest)?)
                };
                Ok(Self::Connect(data))
            }
            '1' => Ok(Self::Disconnect),
            '2' => {
                let mut args: Vec<Value> = serde_json::from_str(rest)?;
                if args.is_empty() {
                    return Err(ProtocolError::MalformedEvent("missing event name".into()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(ProtocolError::MalformedEvent(format!(
                            "event name is not a string: {other}"
                        )))
                    }
                };
                let payload = if args.is_empty() {
                    Value::Null
                } else {
                    args.remove(0)
                };
                Ok(Self::Event { name, payload })
            }
            '3' => Err(ProtocolError::Unsupported("acknowledgement".into())),
            '4' => {
                let data = if rest.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(rest)?
                };
                Ok(Self::ConnectError(data))
            }
            '5' | '6' => Err(ProtocolError::Unsupported("binary attachment".into())),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let packet = match self {
            Self::Connect(None) => "0".to_string(),
            Self::Connect(Some(data)) => format!("0{}", serde_json::to_string(data)?),
            Self::Disconnect => "1".to_string(),
            Self::Event { name, payload } => {
                format!("2{}", serde_json::to_string(&serde_json::json!([name, payload]))?)
            }
            Self::ConnectError(data) => format!("4{}", serde_json::to_string(data)?),
        };
        Ok(packet)
    }
}

// ---------------------------------------------------------------------------
// Typed push events
// ---------------------------------------------------------------------------

/// The push events the client listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushEventKind {
    /// A direct message addressed to (or sent by) the local user.
    NewMessage,
    /// Full roster of currently online user ids.
    OnlineUsers,
    /// The connection went away (locally closed or dropped).
    Disconnect,
}

impl PushEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage => EVENT_NEW_MESSAGE,
            Self::OnlineUsers => EVENT_ONLINE_USERS,
            Self::Disconnect => EVENT_DISCONNECT,
        }
    }
}

impl std::fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    NewMessage(Message),
    OnlineUsers(Vec<UserId>),
    Disconnect,
}

impl PushEvent {
    pub fn kind(&self) -> PushEventKind {
        match self {
            Self::NewMessage(_) => PushEventKind::NewMessage,
            Self::OnlineUsers(_) => PushEventKind::OnlineUsers,
            Self::Disconnect => PushEventKind::Disconnect,
        }
    }

    /// Decode a Socket.IO event. Events the client does not listen for
    /// yield `Ok(None)`; `disconnect` is reserved and never decoded from the
    /// wire.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>, ProtocolError> {
        let event = match name {
            EVENT_NEW_MESSAGE => Self::NewMessage(serde_json::from_value(payload)?),
            EVENT_ONLINE_USERS => Self::OnlineUsers(serde_json::from_value(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_handshake() {
        let frame = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let EnginePacket::Open(handshake) = EnginePacket::parse(frame).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.ping_interval, 25000);
    }

    #[test]
    fn test_ping_pong() {
        assert_eq!(EnginePacket::parse("2").unwrap(), EnginePacket::Ping(None));
        assert_eq!(EnginePacket::Pong(None).encode().unwrap(), "3");
        assert_eq!(
            EnginePacket::parse("2probe").unwrap(),
            EnginePacket::Ping(Some("probe".into()))
        );
    }

    #[test]
    fn test_client_connect_frame() {
        let frame = EnginePacket::Message(SocketPacket::Connect(None))
            .encode()
            .unwrap();
        assert_eq!(frame, "40");
    }

    #[test]
    fn test_parse_connect_confirmation() {
        let packet = EnginePacket::parse(r#"40{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap();
        assert!(matches!(
            packet,
            EnginePacket::Message(SocketPacket::Connect(Some(_)))
        ));
    }

    #[test]
    fn test_parse_online_users_event() {
        let packet = EnginePacket::parse(r#"42["getOnlineUsers",["u1","u2"]]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event { name, payload }) = packet else {
            panic!("expected event");
        };
        let event = PushEvent::decode(&name, payload).unwrap();
        assert_eq!(
            event,
            Some(PushEvent::OnlineUsers(vec![UserId::from("u1"), UserId::from("u2")]))
        );
    }

    #[test]
    fn test_parse_new_message_event() {
        let frame = r#"42["newMessage",{"_id":"m9","senderId":"peer1","receiverId":"me","text":"yo","createdAt":"2024-05-01T10:15:00.000Z","updatedAt":"2024-05-01T10:15:00.000Z"}]"#;
        let EnginePacket::Message(SocketPacket::Event { name, payload }) =
            EnginePacket::parse(frame).unwrap()
        else {
            panic!("expected event");
        };
        let Some(PushEvent::NewMessage(msg)) = PushEvent::decode(&name, payload).unwrap() else {
            panic!("expected newMessage");
        };
        assert_eq!(msg.text.as_deref(), Some("yo"));
    }

    #[test]
    fn test_namespace_and_ack_id_are_skipped() {
        let packet = SocketPacket::parse(r#"2/admin,13["ping",1]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "ping".into(),
                payload: serde_json::json!(1)
            }
        );
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        assert_eq!(
            PushEvent::decode("typing", serde_json::json!({})).unwrap(),
            None
        );
        assert_eq!(
            PushEvent::decode(EVENT_DISCONNECT, Value::Null).unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(EnginePacket::parse(""), Err(ProtocolError::Empty)));
        assert!(matches!(
            EnginePacket::parse("9"),
            Err(ProtocolError::UnknownPacketType('9'))
        ));
        assert!(EnginePacket::parse("42[]").is_err());
        assert!(EnginePacket::parse("42[7]").is_err());
        assert!(EnginePacket::parse("451-[\"bin\",{}]").is_err());
        assert!(PushEvent::decode(EVENT_ONLINE_USERS, serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_event_encoding() {
        let packet = SocketPacket::Event {
            name: "getOnlineUsers".into(),
            payload: serde_json::json!(["u1"]),
        };
        assert_eq!(packet.encode().unwrap(), r#"2["getOnlineUsers",["u1"]]"#);
    }
}
