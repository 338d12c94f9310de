//! Socket.IO client for the backend's real-time message bus
//!
//! One background task owns the WebSocket for the life of the process. It
//! reconnects with exponential backoff and rejoins the last room it was asked
//! to join.

pub mod events;
pub mod packet;
pub mod websocket;

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::api::{chat, client::ChatClient};
use crate::auth::{require_identity, IdentityStore};
use crate::models::{Content, ConversationId, Identity, Message, UserId};
use crate::session::outgoing_message;
use events::{ClientEvent, ServerEvent};
use websocket::{RealtimeSocket, SocketEvent};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// A connection that lasted this long resets the backoff.
const STABILITY_THRESHOLD: Duration = Duration::from_secs(60);

/// What the socket task reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Connected,
    Disconnected(String),
    Message(Message),
}

/// Reason the inner connection loop exited.
enum DisconnectReason {
    /// The handle was dropped. Do not reconnect.
    Shutdown,
    /// Error or server-initiated close. Should reconnect.
    Error(anyhow::Error),
}

/// Owner side of the socket task. Dropping it shuts the task down.
pub struct RealtimeHandle {
    cmd_tx: mpsc::UnboundedSender<ClientEvent>,
    event_rx: mpsc::UnboundedReceiver<RealtimeEvent>,
}

impl RealtimeHandle {
    /// Spawn the socket task for `backend_url`.
    pub fn start(backend_url: String) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(backend_url, cmd_rx, event_tx));
        Self { cmd_tx, event_rx }
    }

    /// Queue an event for the socket. Messages emitted while disconnected are
    /// dropped; a room join is remembered and replayed on reconnect.
    pub fn emit(&self, event: ClientEvent) {
        if self.cmd_tx.send(event).is_err() {
            tracing::warn!("Real-time task has stopped; event dropped");
        }
    }

    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.event_rx.recv().await
    }
}

/// Keep a connection up until the handle goes away.
async fn run_connection(
    backend_url: String,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientEvent>,
    event_tx: mpsc::UnboundedSender<RealtimeEvent>,
) {
    let mut backoff = INITIAL_BACKOFF;
    let mut room: Option<ConversationId> = None;

    loop {
        let error = match connect_and_run(&backend_url, &mut cmd_rx, &event_tx, &mut room).await {
            Ok(DisconnectReason::Shutdown) => {
                tracing::info!("Real-time connection shut down");
                return;
            }
            Ok(DisconnectReason::Error(e)) => {
                backoff = INITIAL_BACKOFF;
                e
            }
            Err(e) => e,
        };

        tracing::warn!(
            "Real-time connection lost: {:#}. Reconnecting in {}s...",
            error,
            backoff.as_secs()
        );
        if event_tx
            .send(RealtimeEvent::Disconnected(format!("{:#}", error)))
            .is_err()
        {
            return;
        }

        let wait = time::sleep(backoff);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => break,
                cmd = cmd_rx.recv() => match cmd {
                    None => return,
                    Some(ClientEvent::JoinRoom(id)) => room = Some(id),
                    Some(event) => {
                        tracing::warn!("Not connected; dropping {} event", event.name());
                    }
                },
            }
        }

        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Run one connection: connect, rejoin, pump events and commands.
///
/// Returns `Ok` for a shutdown or for an error after a stable session (the
/// caller resets its backoff), `Err` for an early failure.
async fn connect_and_run(
    backend_url: &str,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    event_tx: &mpsc::UnboundedSender<RealtimeEvent>,
    room: &mut Option<ConversationId>,
) -> Result<DisconnectReason> {
    let mut socket = RealtimeSocket::connect(backend_url).await?;
    if event_tx.send(RealtimeEvent::Connected).is_err() {
        return Ok(DisconnectReason::Shutdown);
    }

    if let Some(id) = *room {
        tracing::info!("Rejoining room {}", id);
        socket.emit(&ClientEvent::JoinRoom(id)).await?;
    }

    let connected_at = Instant::now();
    let silence = socket.heartbeat_timeout();
    let deadline = time::sleep(silence);
    tokio::pin!(deadline);

    let reason = loop {
        tokio::select! {
            event = socket.recv() => {
                deadline.as_mut().reset(Instant::now() + silence);
                match event {
                    Ok(SocketEvent::Heartbeat) => {}
                    Ok(SocketEvent::Event(ServerEvent::ReceiveMessage(msg))) => {
                        if event_tx.send(RealtimeEvent::Message(msg)).is_err() {
                            break DisconnectReason::Shutdown;
                        }
                    }
                    Ok(SocketEvent::Event(ServerEvent::Other(name))) => {
                        tracing::debug!("Ignoring {} event", name);
                    }
                    Ok(SocketEvent::Closed) => {
                        break DisconnectReason::Error(anyhow!("Connection closed by server"));
                    }
                    Err(e) => break DisconnectReason::Error(e.context("WebSocket recv error")),
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                None => break DisconnectReason::Shutdown,
                Some(event) => {
                    if let ClientEvent::JoinRoom(id) = event {
                        *room = Some(id);
                    }
                    if let Err(e) = socket.emit(&event).await {
                        break DisconnectReason::Error(e);
                    }
                }
            },
            _ = &mut deadline => {
                break DisconnectReason::Error(anyhow!("No heartbeat for {}s", silence.as_secs()));
            }
        }
    };

    if let DisconnectReason::Shutdown = reason {
        if let Err(e) = socket.close().await {
            tracing::debug!("Close failed: {:#}", e);
        }
        return Ok(reason);
    }

    if connected_at.elapsed() >= STABILITY_THRESHOLD {
        return Ok(reason);
    }

    match reason {
        DisconnectReason::Shutdown => Ok(DisconnectReason::Shutdown),
        DisconnectReason::Error(e) => Err(e),
    }
}

async fn open_conversation<S: IdentityStore>(
    client: &ChatClient,
    store: &S,
    partner: UserId,
) -> Result<(Identity, ConversationId)> {
    let me = require_identity(store)?;
    let conversation = chat::find_or_create_conversation(client, me.id, partner)
        .await
        .context("Failed to find or create conversation")?;
    Ok((me, conversation.id))
}

/// Connect, join the room shared with `partner` and publish one message.
async fn publish(
    client: &ChatClient,
    me: &Identity,
    conversation: ConversationId,
    content: &str,
) -> Result<()> {
    let Some(msg) = outgoing_message(content, me, Some(conversation)) else {
        bail!("Message is empty");
    };

    let mut socket = RealtimeSocket::connect(client.base_url()).await?;
    socket.emit(&ClientEvent::JoinRoom(conversation)).await?;
    socket.emit(&ClientEvent::SendMessage(msg)).await?;
    socket.close().await
}

/// Send a text message to `partner`.
pub async fn send_message<S: IdentityStore>(
    client: &ChatClient,
    store: &S,
    partner: UserId,
    text: &str,
) -> Result<()> {
    let (me, conversation) = open_conversation(client, store, partner).await?;
    publish(client, &me, conversation, text).await?;
    println!("Message sent.");
    Ok(())
}

/// Upload a file and send its URL to `partner`.
pub async fn upload<S: IdentityStore>(
    client: &ChatClient,
    store: &S,
    partner: UserId,
    path: &Path,
) -> Result<()> {
    let (me, conversation) = open_conversation(client, store, partner).await?;
    let url = chat::upload_file(client, path)
        .await
        .context("File upload failed.")?;
    publish(client, &me, conversation, &url).await?;
    println!("Uploaded: {}", url);
    Ok(())
}

/// Print messages arriving in the conversation with `partner` until Ctrl-C.
pub async fn listen<S: IdentityStore>(
    client: &ChatClient,
    store: &S,
    partner: UserId,
) -> Result<()> {
    let (me, conversation) = open_conversation(client, store, partner).await?;
    let prefix = client.uploads_prefix();

    let mut handle = RealtimeHandle::start(client.base_url().to_string());
    handle.emit(ClientEvent::JoinRoom(conversation));

    println!("Listening on conversation {}... (Ctrl-C to stop)", conversation);

    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Some(RealtimeEvent::Message(msg)) => {
                    if msg.conversation_id() != Some(conversation) {
                        continue;
                    }
                    let arrow = if me.is(msg.user.id) { ">" } else { "<" };
                    let content = Content::classify(&msg.content, &prefix);
                    println!("{} {}: {}", arrow, msg.user.username, content);
                }
                Some(RealtimeEvent::Connected) => tracing::info!("Connected"),
                Some(RealtimeEvent::Disconnected(reason)) => {
                    tracing::warn!("Disconnected: {}", reason);
                }
                None => bail!("Real-time connection ended"),
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                return Ok(());
            }
        }
    }
}
