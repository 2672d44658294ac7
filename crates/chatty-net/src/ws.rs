//! Socket.IO client over a plain WebSocket.
//!
//! Only the WebSocket transport is used (no HTTP long-polling upgrade). The
//! connect sequence is: WebSocket upgrade, Engine.IO `open`, client sends
//! Socket.IO `connect` (`40`), server confirms. After that a background task
//! answers pings, decodes events and hands them to the [`SocketHandle`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use chatty_shared::constants::{ENGINE_IO_VERSION, SOCKET_IO_PATH, SOCKET_USER_QUERY};
use chatty_shared::protocol::OpenHandshake;
use chatty_shared::{EnginePacket, PushEvent, SocketPacket, UserId};

use crate::error::TransportError;
use crate::socket::{PushConnector, SocketHandle};

/// Build the WebSocket URL for `user_id` from an `http(s)://` or `ws(s)://`
/// base.
pub fn socket_endpoint(base: &str, user_id: &UserId) -> Result<Url, TransportError> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme: {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidUrl(base.to_string()))?;
    url.set_path(SOCKET_IO_PATH);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket")
        .append_pair(SOCKET_USER_QUERY, user_id.as_str());
    Ok(url)
}

pub struct WsConnector {
    base_url: String,
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(base_url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            handshake_timeout,
        }
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self, handle: Arc<SocketHandle>) -> Result<(), TransportError> {
        let url = socket_endpoint(&self.base_url, handle.user_id())?;
        debug!(url = %url, "opening push connection");

        let (ws, _) = tokio::time::timeout(
            self.handshake_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;
        let (mut sink, mut stream) = ws.split();

        let session = tokio::time::timeout(self.handshake_timeout, async {
            let open = match next_packet(&mut stream).await? {
                EnginePacket::Open(open) => open,
                other => {
                    return Err(TransportError::Handshake(format!(
                        "expected open packet, got {other:?}"
                    )))
                }
            };

            send_packet(&mut sink, EnginePacket::Message(SocketPacket::Connect(None))).await?;

            // Events can race the connect confirmation; keep them for later.
            let mut early = Vec::new();
            loop {
                match next_packet(&mut stream).await? {
                    EnginePacket::Message(SocketPacket::Connect(_)) => break,
                    EnginePacket::Message(SocketPacket::ConnectError(data)) => {
                        return Err(TransportError::Handshake(data.to_string()))
                    }
                    EnginePacket::Message(SocketPacket::Event { name, payload }) => {
                        early.push((name, payload))
                    }
                    EnginePacket::Ping(data) => send_packet(&mut sink, EnginePacket::Pong(data)).await?,
                    EnginePacket::Close | EnginePacket::Message(SocketPacket::Disconnect) => {
                        return Err(TransportError::Closed)
                    }
                    _ => {}
                }
            }
            Ok::<_, TransportError>((open, early))
        })
        .await
        .map_err(|_| TransportError::Timeout)?;

        let (open, early) = match session {
            Ok(session) => session,
            Err(e) => {
                let _ = sink.close().await;
                return Err(e);
            }
        };

        handle.mark_connected();
        info!(
            user = %handle.user_id().short(),
            sid = %open.sid,
            "push connection established"
        );

        for (name, payload) in early {
            deliver(&handle, &name, payload);
        }

        tokio::spawn(drive(handle, sink, stream, open));
        Ok(())
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, WsMessage>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Connection loop; runs until the server goes away or the handle is closed.
async fn drive(handle: Arc<SocketHandle>, mut sink: WsSink, mut stream: WsSource, open: OpenHandshake) {
    let mut shutdown = handle.shutdown_signal();
    // The server pings every `ping_interval`; silence past the grace period
    // means the connection is dead.
    let idle = Duration::from_millis(open.ping_interval + open.ping_timeout);

    loop {
        let closing = *shutdown.borrow_and_update();
        if closing {
            let _ = send_packet(&mut sink, EnginePacket::Message(SocketPacket::Disconnect)).await;
            let _ = sink.close().await;
            info!(user = %handle.user_id().short(), "push connection closed locally");
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            frame = tokio::time::timeout(idle, stream.next()) => {
                match frame {
                    Err(_) => {
                        warn!(user = %handle.user_id().short(), "push connection timed out");
                        break;
                    }
                    Ok(None) | Ok(Some(Ok(WsMessage::Close(_)))) => {
                        info!(user = %handle.user_id().short(), "push connection closed by server");
                        break;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "push connection failed");
                        break;
                    }
                    Ok(Some(Ok(WsMessage::Text(text)))) => match on_frame(&handle, &text) {
                        Step::Continue => {}
                        Step::Reply(packet) => {
                            if let Err(e) = send_packet(&mut sink, packet).await {
                                warn!(error = %e, "failed to answer ping");
                                break;
                            }
                        }
                        Step::Stop => break,
                    },
                    Ok(Some(Ok(_))) => {}
                }
            }
        }
    }

    handle.mark_disconnected();
}

enum Step {
    Continue,
    Reply(EnginePacket),
    Stop,
}

fn on_frame(handle: &SocketHandle, text: &str) -> Step {
    let packet = match EnginePacket::parse(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(error = %e, "dropping unreadable frame");
            return Step::Continue;
        }
    };

    match packet {
        EnginePacket::Ping(data) => Step::Reply(EnginePacket::Pong(data)),
        EnginePacket::Message(SocketPacket::Event { name, payload }) => {
            deliver(handle, &name, payload);
            Step::Continue
        }
        EnginePacket::Close | EnginePacket::Message(SocketPacket::Disconnect) => {
            info!("server ended the session");
            Step::Stop
        }
        EnginePacket::Message(SocketPacket::ConnectError(data)) => {
            warn!(error = %data, "server rejected the session");
            Step::Stop
        }
        _ => Step::Continue,
    }
}

fn deliver(handle: &SocketHandle, name: &str, payload: serde_json::Value) {
    match PushEvent::decode(name, payload) {
        Ok(Some(event)) => handle.dispatch(&event),
        Ok(None) => debug!(event = name, "ignoring unhandled push event"),
        Err(e) => warn!(event = name, error = %e, "malformed push event"),
    }
}

async fn next_packet(stream: &mut WsSource) -> Result<EnginePacket, TransportError> {
    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(EnginePacket::parse(&text)?),
            Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_packet(sink: &mut WsSink, packet: EnginePacket) -> Result<(), TransportError> {
    let frame = packet.encode()?;
    sink.send(WsMessage::Text(frame)).await?;
    Ok(())
}
