//! TUI application state and main event loop

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::time;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::{ComposeMode, ComposeState};
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::sidebar::SidebarState;
use super::ui;
use crate::api::client::ChatClient;
use crate::auth::{logout_with, IdentityStore};
use crate::models::{Identity, UserId};
use crate::realtime::events::ClientEvent;
use crate::realtime::{RealtimeEvent, RealtimeHandle};
use crate::session::{ChatSession, Effect, Intent};

/// Redraw interval when nothing else happens (keeps the log line fresh).
const TICK: Duration = Duration::from_millis(250);

/// Lines moved per PageUp/PageDown in the messages pane.
const PAGE: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Users,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Users => "users",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Connecting,
    Online,
    Offline(String),
}

/// How the chat screen ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    LoggedOut,
}

pub struct App {
    pub session: ChatSession,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub active_pane: Pane,
    pub connection: Connection,
    /// Blocking notice; all keys except Enter/Esc are swallowed while shown.
    pub alert: Option<String>,
    /// Transient status line message and whether it is an error.
    pub status: Option<(String, bool)>,
    pub last_log: Option<String>,
    /// Partner to reopen once the directory arrives.
    resume: Option<UserId>,
    pub exit: Option<Exit>,
}

impl App {
    pub fn new(session: ChatSession, resume: Option<UserId>) -> Self {
        Self {
            session,
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            active_pane: Pane::default(),
            connection: Connection::Connecting,
            alert: None,
            status: None,
            last_log: None,
            resume,
            exit: None,
        }
    }

    /// Panes on screen for the current layout, in Tab order.
    pub fn visible_panes(&self) -> &'static [Pane] {
        if !self.session.is_narrow() {
            &[Pane::Users, Pane::Messages, Pane::Compose]
        } else if self.session.shows_chat() {
            &[Pane::Messages, Pane::Compose]
        } else {
            &[Pane::Users]
        }
    }

    fn focus(&mut self, pane: Pane) {
        self.active_pane = pane;
        self.fix_focus();
    }

    /// Move focus onto a visible pane after a layout change.
    fn fix_focus(&mut self) {
        let panes = self.visible_panes();
        if !panes.contains(&self.active_pane) {
            self.active_pane = if panes.contains(&Pane::Compose) {
                Pane::Compose
            } else {
                panes[0]
            };
        }
    }

    fn cycle_pane(&mut self) {
        let panes = self.visible_panes();
        let idx = panes
            .iter()
            .position(|p| *p == self.active_pane)
            .map_or(0, |i| (i + 1) % panes.len());
        self.active_pane = panes[idx];
    }

    fn dispatch(&mut self, intent: Intent) -> Vec<Effect> {
        let effects = self.session.dispatch(intent);
        self.fix_focus();
        effects
    }

    pub fn resize(&mut self, width: u16, height: u16) -> Vec<Effect> {
        self.dispatch(Intent::Resize { width, height })
    }

    /// Map a key press to session intents.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.exit = Some(Exit::Quit);
            return Vec::new();
        }

        if self.alert.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.alert = None;
            }
            return Vec::new();
        }

        match key.code {
            KeyCode::Char('l') if ctrl => return self.dispatch(Intent::Logout),
            KeyCode::Char('a') if ctrl => {
                if self.session.active().is_some() {
                    self.compose.start_attach();
                    self.focus(Pane::Compose);
                } else {
                    self.set_status("Select a user before attaching a file", true);
                }
                return Vec::new();
            }
            KeyCode::Tab => {
                self.cycle_pane();
                return Vec::new();
            }
            KeyCode::Esc => {
                if self.compose.mode == ComposeMode::AttachPath {
                    self.compose.end_attach();
                    return Vec::new();
                }
                self.messages.follow();
                let effects = self.dispatch(Intent::Back);
                self.focus(Pane::Users);
                return effects;
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Users => self.handle_users_key(key),
            Pane::Messages => self.handle_messages_key(key),
            Pane::Compose => self.handle_compose_key(key, ctrl),
        }
    }

    fn handle_users_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let users = self.session.directory().unwrap_or_default();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.sidebar.move_down(users.len()),
            KeyCode::Char('q') => self.exit = Some(Exit::Quit),
            KeyCode::Enter => {
                let Some(id) = self.sidebar.selected_user(users).map(|u| u.id) else {
                    return Vec::new();
                };
                self.messages.follow();
                let effects = self.dispatch(Intent::SelectUser(id));
                self.focus(Pane::Compose);
                return effects;
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_messages_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.messages.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE),
            KeyCode::PageDown => self.messages.scroll_down(PAGE),
            KeyCode::End => self.messages.follow(),
            KeyCode::Char('q') => self.exit = Some(Exit::Quit),
            _ => {}
        }
        Vec::new()
    }

    fn handle_compose_key(&mut self, key: KeyEvent, ctrl: bool) -> Vec<Effect> {
        match key.code {
            KeyCode::Enter => return self.submit(),
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            _ => {}
        }
        Vec::new()
    }

    /// Enter in the compose box: send the message or upload the path.
    fn submit(&mut self) -> Vec<Effect> {
        match self.compose.mode {
            ComposeMode::Message => {
                let effects = self.dispatch(Intent::Send(self.compose.input.clone()));
                // Input is only cleared once something was actually sent.
                if !effects.is_empty() {
                    self.compose.clear();
                    self.messages.follow();
                }
                effects
            }
            ComposeMode::AttachPath => {
                let path = self.compose.input.trim().to_string();
                if path.is_empty() {
                    return Vec::new();
                }
                self.compose.end_attach();
                self.dispatch(Intent::Attach(PathBuf::from(path)))
            }
        }
    }

    pub fn handle_backend(&mut self, response: BackendResponse) -> Vec<Effect> {
        match response {
            BackendResponse::Users(Ok(users)) => {
                let effects = self.session.on_directory(users, self.resume.take());
                let directory = self.session.directory().unwrap_or_default();
                self.sidebar.clamp(directory.len());
                if let Some(id) = self.session.highlighted() {
                    self.sidebar.focus(directory, id);
                    self.focus(Pane::Compose);
                }
                effects
            }
            BackendResponse::Users(Err(e)) => {
                tracing::error!("Failed to load users: {:#}", e);
                self.set_status("Could not load users", true);
                Vec::new()
            }
            BackendResponse::Conversation { seq, result } => {
                self.session.on_conversation(seq, result)
            }
            BackendResponse::History {
                conversation,
                result,
            } => {
                self.session.on_history(conversation, result);
                self.messages.follow();
                Vec::new()
            }
            BackendResponse::Uploaded {
                conversation,
                result,
            } => {
                if result.is_ok() {
                    self.status = None;
                }
                self.session.on_upload(conversation, result)
            }
        }
    }

    pub fn handle_realtime(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Connected => self.connection = Connection::Online,
            RealtimeEvent::Disconnected(reason) => self.connection = Connection::Offline(reason),
            RealtimeEvent::Message(msg) => {
                if self.session.on_message(msg) && self.messages.scroll_from_bottom == 0 {
                    self.messages.follow();
                }
            }
        }
    }

    pub fn set_status(&mut self, text: &str, is_error: bool) {
        self.status = Some((text.to_string(), is_error));
    }

    /// Effects that only touch UI state.
    fn apply_local(&mut self, effect: &Effect) {
        match effect {
            Effect::Alert(text) => {
                self.status = None;
                self.alert = Some(text.clone());
                // A failed upload leaves no half-typed path behind.
                self.compose.end_attach();
            }
            Effect::Upload { path, .. } => {
                self.set_status(&format!("Uploading {}...", path.display()), false);
            }
            _ => {}
        }
    }
}

/// Carry out effects against the backend, the socket and the store.
fn execute<S: IdentityStore>(
    app: &mut App,
    effects: Vec<Effect>,
    backend: &Backend,
    realtime: &RealtimeHandle,
    store: &mut S,
) {
    for effect in effects {
        app.apply_local(&effect);
        match effect {
            Effect::ResolveConversation { seq, partner } => {
                backend.send(BackendCommand::ResolveConversation {
                    seq,
                    me: app.session.me().id,
                    partner,
                });
            }
            Effect::JoinRoom(id) => realtime.emit(ClientEvent::JoinRoom(id)),
            Effect::FetchHistory(id) => backend.send(BackendCommand::LoadHistory(id)),
            Effect::Publish(msg) => realtime.emit(ClientEvent::SendMessage(msg)),
            Effect::Upload { conversation, path } => {
                backend.send(BackendCommand::Upload { conversation, path });
            }
            Effect::RememberPartner(partner) => {
                store.set_resume_partner(partner);
                if let Err(e) = store.persist() {
                    tracing::warn!("Failed to save resume partner: {:#}", e);
                }
            }
            Effect::Logout => {
                match logout_with(store) {
                    Ok(()) => app.exit = Some(Exit::LoggedOut),
                    Err(e) => {
                        tracing::error!("Logout failed: {:#}", e);
                        app.set_status("Logout failed", true);
                    }
                }
            }
            Effect::Alert(_) => {}
        }
    }
}

/// Run the chat screen until the user quits or logs out.
pub async fn run<S: IdentityStore>(
    client: ChatClient,
    store: &mut S,
    me: Identity,
    resume: Option<UserId>,
    logs: LogBuffer,
) -> Result<Exit> {
    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, client, store, me, resume, logs).await;
    ratatui::restore();
    result
}

async fn run_app<S: IdentityStore>(
    terminal: &mut DefaultTerminal,
    client: ChatClient,
    store: &mut S,
    me: Identity,
    resume: Option<UserId>,
    logs: LogBuffer,
) -> Result<Exit> {
    let session = ChatSession::new(me, client.uploads_prefix());
    let mut app = App::new(session, resume);

    let size = terminal.size()?;
    app.resize(size.width, size.height);

    let mut backend = Backend::start(client.clone());
    let mut realtime = RealtimeHandle::start(client.base_url().to_string());
    backend.send(BackendCommand::LoadUsers);

    let mut events = EventStream::new();
    let mut tick = time::interval(TICK);

    loop {
        if let Some(line) = logs.drain().pop() {
            app.last_log = Some(line);
        }
        terminal.draw(|frame| ui::render(frame, &app))?;

        let effects = tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => app.handle_key(key),
                Some(Ok(Event::Resize(width, height))) => app.resize(width, height),
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(response) = backend.recv() => app.handle_backend(response),
            Some(event) = realtime.recv() => {
                app.handle_realtime(event);
                Vec::new()
            }
            _ = tick.tick() => Vec::new(),
        };

        execute(&mut app, effects, &backend, &realtime, store);

        if let Some(exit) = app.exit {
            return Ok(exit);
        }
    }

    Ok(Exit::Quit)
}
