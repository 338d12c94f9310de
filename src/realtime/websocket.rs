//! Socket.IO WebSocket connection and frame handling

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::events::{ClientEvent, ServerEvent};
use super::packet::{EnginePacket, Handshake, SocketPacket};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// What a call to [`RealtimeSocket::recv`] produced.
#[derive(Debug)]
pub enum SocketEvent {
    /// Server ping (pong queued). Proves the connection is alive.
    Heartbeat,
    Event(ServerEvent),
    /// Server closed the transport or disconnected the namespace.
    Closed,
}

pub struct RealtimeSocket {
    stream: WsStream,
    handshake: Handshake,
    /// Pongs and acks owed to the server, sent before the next read or emit.
    replies: VecDeque<String>,
}

/// Build the Engine.IO WebSocket URL for a backend base URL.
pub fn socket_url(backend_url: &str) -> Result<String> {
    let mut url =
        Url::parse(backend_url).with_context(|| format!("Invalid backend URL {}", backend_url))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => bail!("Unsupported backend URL scheme: {}", other),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("Cannot use {} scheme for {}", scheme, backend_url))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url.to_string())
}

impl RealtimeSocket {
    /// Connect, complete the Engine.IO handshake and join the default namespace.
    pub async fn connect(backend_url: &str) -> Result<Self> {
        let ws_url = socket_url(backend_url)?;
        tracing::info!("Connecting WebSocket to {}", ws_url);

        let (stream, response) = connect_async(ws_url.as_str())
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        let mut stream = stream;
        let first = next_text(&mut stream)
            .await?
            .context("Connection closed before handshake")?;
        let handshake = match EnginePacket::decode(&first).context("Bad handshake frame")? {
            EnginePacket::Open(hs) => hs,
            other => bail!("Expected engine.io open packet, got {:?}", other),
        };
        tracing::debug!(
            "Engine.IO session {} (ping every {}ms)",
            handshake.sid,
            handshake.ping_interval
        );

        let mut socket = Self {
            stream,
            handshake,
            replies: VecDeque::new(),
        };
        socket
            .send_frame(SocketPacket::Connect(None).to_frame())
            .await?;

        // Wait for the namespace connect ack, answering pings meanwhile.
        loop {
            let text = next_text(&mut socket.stream)
                .await?
                .context("Connection closed before namespace connect")?;
            match EnginePacket::decode(&text)? {
                EnginePacket::Ping(data) => {
                    socket.send_frame(EnginePacket::Pong(data).encode()).await?;
                }
                EnginePacket::Message(body) => match SocketPacket::decode(&body)? {
                    SocketPacket::Connect(_) => break,
                    SocketPacket::ConnectError(data) => {
                        bail!("Server refused the connection: {}", data)
                    }
                    other => tracing::debug!("Ignoring packet before connect: {:?}", other),
                },
                EnginePacket::Close => bail!("Server closed the connection during connect"),
                _ => {}
            }
        }

        tracing::info!("Socket.IO connected");
        Ok(socket)
    }

    /// Longest silence tolerated before the server is presumed gone.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake.ping_interval + self.handshake.ping_timeout)
    }

    /// Emit an event on the default namespace.
    pub async fn emit(&mut self, event: &ClientEvent) -> Result<()> {
        let frame = event.to_packet()?.to_frame();
        self.flush_replies().await?;
        self.send_frame(frame).await
    }

    /// Receive the next meaningful event.
    ///
    /// Server pings are answered and event acks requested by the server are
    /// sent automatically. Both replies are queued and go out at the start of
    /// the next `recv` or `emit`, so a frame that has been read is always
    /// returned. Undecodable frames are logged and skipped.
    ///
    /// # Cancel safety
    ///
    /// Cancel safe: dropping the future before it completes loses no frame,
    /// and queued replies stay queued until written.
    pub async fn recv(&mut self) -> Result<SocketEvent> {
        self.flush_replies().await?;
        loop {
            let Some(text) = next_text(&mut self.stream).await? else {
                return Ok(SocketEvent::Closed);
            };

            let packet = match EnginePacket::decode(&text) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Skipping bad frame {:?}: {}", text, e);
                    continue;
                }
            };

            match packet {
                EnginePacket::Ping(data) => {
                    self.queue_reply(EnginePacket::Pong(data).encode());
                    return Ok(SocketEvent::Heartbeat);
                }
                EnginePacket::Close => return Ok(SocketEvent::Closed),
                EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                    Ok(SocketPacket::Event { name, args, ack_id }) => {
                        if let Some(ack_id) = ack_id {
                            let ack = SocketPacket::Ack {
                                ack_id,
                                args: Vec::new(),
                            };
                            self.queue_reply(ack.to_frame());
                        }
                        match ServerEvent::from_event(&name, args) {
                            Ok(event) => return Ok(SocketEvent::Event(event)),
                            Err(e) => tracing::warn!("Dropping {} event: {:#}", name, e),
                        }
                    }
                    Ok(SocketPacket::Disconnect) => return Ok(SocketEvent::Closed),
                    Ok(other) => tracing::debug!("Ignoring packet: {:?}", other),
                    Err(e) => tracing::warn!("Skipping bad packet {:?}: {}", body, e),
                },
                EnginePacket::Open(_)
                | EnginePacket::Pong(_)
                | EnginePacket::Upgrade
                | EnginePacket::Noop => {}
            }
        }
    }

    /// Leave the namespace and close the WebSocket.
    pub async fn close(mut self) -> Result<()> {
        self.flush_replies().await?;
        self.send_frame(SocketPacket::Disconnect.to_frame()).await?;
        self.stream
            .close(None)
            .await
            .context("Failed to close WebSocket")
    }

    fn queue_reply(&mut self, frame: String) {
        tracing::debug!("WS reply queued: {}", frame);
        self.replies.push_back(frame);
    }

    /// Write queued replies. A reply leaves the queue only once the sink has
    /// accepted it, so cancelling mid-flush neither drops nor repeats one.
    async fn flush_replies(&mut self) -> Result<()> {
        if self.replies.is_empty() {
            return Ok(());
        }
        while let Some(frame) = self.replies.front() {
            tracing::debug!("WS send: {}", frame);
            self.stream
                .feed(Message::Text(frame.clone()))
                .await
                .context("Failed to send WebSocket message")?;
            self.replies.pop_front();
        }
        self.stream
            .flush()
            .await
            .context("Failed to send WebSocket message")
    }

    async fn send_frame(&mut self, frame: String) -> Result<()> {
        if let Some(max) = self.handshake.max_payload {
            if frame.len() as u64 > max {
                bail!("Frame of {} bytes exceeds the server limit of {}", frame.len(), max);
            }
        }
        tracing::debug!("WS send: {}", frame);
        self.stream
            .send(Message::Text(frame))
            .await
            .context("Failed to send WebSocket message")
    }
}

/// Next text frame, skipping control frames. tungstenite answers WebSocket
/// pings itself on the next read or write.
async fn next_text(stream: &mut WsStream) -> Result<Option<String>> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                tracing::debug!("WS recv: {}", text);
                return Ok(Some(text));
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!("WebSocket closed: {:?}", frame);
                return Ok(None);
            }
            Some(Ok(other)) => {
                tracing::debug!("WS frame (ignored): {:?}", other);
            }
            Some(Err(e)) => {
                return Err(e).context("WebSocket receive error");
            }
            None => {
                return Ok(None);
            }
        }
    }
}
