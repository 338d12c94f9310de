//! Chat session state: the directory, the single active conversation and
//! its message view.
//!
//! All changes go through [`ChatSession::dispatch`] (user intents) or the
//! `on_*` methods (results of effects). A selection switches the active
//! conversation, the room subscription and the view in one step, and results
//! that belong to a superseded selection are dropped.

mod intent;
mod view;

use std::collections::HashSet;

use anyhow::Result;

pub use intent::{Effect, Intent};
pub use view::{ChatMessage, MessageView, CHAT_ERROR_TEXT, HISTORY_ERROR_TEXT};

use crate::models::{
    Conversation, ConversationId, Identity, Message, OutgoingMessage, User, UserId,
};

/// Below this width only one of user list or chat is shown.
pub const NARROW_WIDTH: u16 = 70;

pub const UPLOAD_FAILED_TEXT: &str = "File upload failed.";

/// Build the `sendMessage` payload, or `None` if there is nothing to send or
/// nowhere to send it.
pub fn outgoing_message(
    content: &str,
    me: &Identity,
    conversation: Option<ConversationId>,
) -> Option<OutgoingMessage> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    Some(OutgoingMessage {
        content: content.to_string(),
        user_id: me.id,
        conversation_id: conversation?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    pub id: ConversationId,
    pub partner: User,
}

#[derive(Debug)]
struct PendingSelection {
    seq: u64,
    partner: User,
}

pub struct ChatSession {
    me: Identity,
    uploads_prefix: String,
    /// `None` until the directory has loaded.
    directory: Option<Vec<User>>,
    active: Option<ActiveConversation>,
    pending: Option<PendingSelection>,
    next_seq: u64,
    view: MessageView,
    /// Messages for the active conversation that arrived while its history loaded.
    held: Vec<Message>,
    /// User highlighted in the list; set on click, before anything resolves.
    highlighted: Option<UserId>,
    narrow: bool,
}

impl ChatSession {
    pub fn new(me: Identity, uploads_prefix: String) -> Self {
        Self {
            me,
            uploads_prefix,
            directory: None,
            active: None,
            pending: None,
            next_seq: 0,
            view: MessageView::Idle,
            held: Vec::new(),
            highlighted: None,
            narrow: false,
        }
    }

    pub fn me(&self) -> &Identity {
        &self.me
    }

    /// Chat partners, once loaded.
    pub fn directory(&self) -> Option<&[User]> {
        self.directory.as_deref()
    }

    pub fn active(&self) -> Option<&ActiveConversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn view(&self) -> &MessageView {
        &self.view
    }

    pub fn highlighted(&self) -> Option<UserId> {
        self.highlighted
    }

    /// The highlighted user, resolved against the directory.
    pub fn highlighted_user(&self) -> Option<&User> {
        let id = self.highlighted?;
        self.directory.as_ref()?.iter().find(|u| u.id == id)
    }

    pub fn is_narrow(&self) -> bool {
        self.narrow
    }

    /// In narrow layouts: whether the chat (rather than the list) is on screen.
    pub fn shows_chat(&self) -> bool {
        self.highlighted.is_some()
    }

    /// Map a user intent to its transition.
    pub fn dispatch(&mut self, intent: Intent) -> Vec<Effect> {
        match intent {
            Intent::SelectUser(id) => self.select_user(id),
            Intent::Send(text) => self.send(&text),
            Intent::Attach(path) => match self.active_id() {
                Some(conversation) => vec![Effect::Upload { conversation, path }],
                None => Vec::new(),
            },
            Intent::Back => {
                self.back();
                Vec::new()
            }
            Intent::Logout => vec![Effect::Logout],
            Intent::Resize { width, .. } => {
                self.narrow = width < NARROW_WIDTH;
                Vec::new()
            }
        }
    }

    /// Store the directory (minus ourselves) and re-select the resume partner
    /// if it is in there.
    pub fn on_directory(&mut self, users: Vec<User>, resume: Option<UserId>) -> Vec<Effect> {
        let partners: Vec<User> = users.into_iter().filter(|u| !self.me.is(u.id)).collect();
        tracing::debug!("Directory loaded: {} users", partners.len());
        let resume = resume.filter(|id| partners.iter().any(|u| u.id == *id));
        self.directory = Some(partners);

        match resume {
            Some(id) => self.select_user(id),
            None => Vec::new(),
        }
    }

    fn select_user(&mut self, id: UserId) -> Vec<Effect> {
        let Some(partner) = self
            .directory
            .as_ref()
            .and_then(|users| users.iter().find(|u| u.id == id))
            .cloned()
        else {
            tracing::debug!("Ignoring selection of unknown user {}", id);
            return Vec::new();
        };

        self.highlighted = Some(partner.id);

        // Switching partners drops the old conversation right away, so nothing
        // from its room can reach the view while the new one resolves.
        if self.active.as_ref().map(|a| a.partner.id) != Some(partner.id) {
            self.active = None;
            self.held.clear();
            self.view = MessageView::Loading;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        self.pending = Some(PendingSelection {
            seq,
            partner: partner.clone(),
        });

        vec![Effect::ResolveConversation {
            seq,
            partner: partner.id,
        }]
    }

    /// Result of [`Effect::ResolveConversation`].
    pub fn on_conversation(&mut self, seq: u64, result: Result<Conversation>) -> Vec<Effect> {
        let pending = match self.pending.take() {
            Some(p) if p.seq == seq => p,
            other => {
                tracing::debug!("Dropping stale conversation result (seq {})", seq);
                self.pending = other;
                return Vec::new();
            }
        };

        let conversation = match result {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Error selecting user or fetching conversation: {:#}", e);
                self.view = MessageView::Error(CHAT_ERROR_TEXT);
                return Vec::new();
            }
        };

        let remember = Effect::RememberPartner(Some(pending.partner.id));
        if self.active_id() == Some(conversation.id) {
            return vec![remember];
        }

        tracing::info!(
            "Opening conversation {} with {}",
            conversation.id,
            pending.partner.username
        );
        self.active = Some(ActiveConversation {
            id: conversation.id,
            partner: pending.partner,
        });
        self.held.clear();
        self.view = MessageView::Loading;

        vec![
            Effect::JoinRoom(conversation.id),
            Effect::FetchHistory(conversation.id),
            remember,
        ]
    }

    /// Result of [`Effect::FetchHistory`].
    pub fn on_history(&mut self, conversation: ConversationId, result: Result<Vec<Message>>) {
        if self.active_id() != Some(conversation) || self.view != MessageView::Loading {
            tracing::debug!("Dropping history for inactive conversation {}", conversation);
            return;
        }

        let history = match result {
            Ok(h) => h,
            Err(e) => {
                tracing::error!("Error fetching message history: {:#}", e);
                self.held.clear();
                self.view = MessageView::Error(HISTORY_ERROR_TEXT);
                return;
            }
        };

        let seen: HashSet<i64> = history.iter().filter_map(|m| m.id).collect();
        let held = std::mem::take(&mut self.held);
        let late = held
            .into_iter()
            .filter(|m| m.id.map_or(true, |id| !seen.contains(&id)));

        let messages = history
            .into_iter()
            .chain(late)
            .map(|m| ChatMessage::from_message(m, self.me.id, &self.uploads_prefix))
            .collect();
        self.view = MessageView::Messages(messages);
    }

    /// A `receiveMessage` event. Returns whether the view changed.
    pub fn on_message(&mut self, msg: Message) -> bool {
        let Some(active) = self.active_id() else {
            return false;
        };
        if msg.conversation_id() != Some(active) {
            return false;
        }

        match self.view {
            MessageView::Messages(ref mut messages) => {
                messages.push(ChatMessage::from_message(
                    msg,
                    self.me.id,
                    &self.uploads_prefix,
                ));
                true
            }
            MessageView::Loading => {
                self.held.push(msg);
                false
            }
            // History failed but the room is joined: live messages start a
            // fresh list.
            MessageView::Error(_) => {
                self.view = MessageView::Messages(vec![ChatMessage::from_message(
                    msg,
                    self.me.id,
                    &self.uploads_prefix,
                )]);
                true
            }
            MessageView::Idle => false,
        }
    }

    /// Result of [`Effect::Upload`]: send the URL as a message, or alert.
    pub fn on_upload(&mut self, conversation: ConversationId, result: Result<String>) -> Vec<Effect> {
        match result {
            Ok(url) => outgoing_message(&url, &self.me, Some(conversation))
                .map(Effect::Publish)
                .into_iter()
                .collect(),
            Err(e) => {
                tracing::error!("Error uploading file: {:#}", e);
                vec![Effect::Alert(UPLOAD_FAILED_TEXT.to_string())]
            }
        }
    }

    fn send(&mut self, text: &str) -> Vec<Effect> {
        outgoing_message(text, &self.me, self.active_id())
            .map(Effect::Publish)
            .into_iter()
            .collect()
    }

    fn back(&mut self) {
        self.active = None;
        self.pending = None;
        self.highlighted = None;
        self.held.clear();
        self.view = MessageView::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, Direction};
    use anyhow::anyhow;
    use std::path::PathBuf;

    const PREFIX: &str = "https://chat.example.com/uploads/";

    fn user(id: i64, name: &str) -> User {
        User {
            id: UserId(id),
            username: name.into(),
        }
    }

    fn message(id: i64, conversation: i64, from: &User, content: &str) -> Message {
        Message {
            id: Some(id),
            content: content.into(),
            user: from.clone(),
            conversation: Some(Conversation {
                id: ConversationId(conversation),
            }),
            created_at: None,
        }
    }

    fn session() -> ChatSession {
        let me = Identity {
            id: UserId(1),
            username: "ana".into(),
        };
        let mut s = ChatSession::new(me, PREFIX.into());
        s.on_directory(vec![user(1, "ana"), user(2, "bo"), user(3, "cy")], None);
        s
    }

    fn resolve_seq(effects: &[Effect]) -> u64 {
        match effects {
            [Effect::ResolveConversation { seq, .. }] => *seq,
            other => panic!("expected a single resolve, got {:?}", other),
        }
    }

    /// Select `partner`, resolve it to `conversation` and load `history`.
    fn open(s: &mut ChatSession, partner: i64, conversation: i64, history: Vec<Message>) {
        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(partner))));
        s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(conversation),
            }),
        );
        s.on_history(ConversationId(conversation), Ok(history));
    }

    #[test]
    fn test_directory_excludes_self() {
        let s = session();
        let names: Vec<&str> = s
            .directory()
            .unwrap()
            .iter()
            .map(|u| u.username.as_str())
            .collect();
        assert_eq!(names, vec!["bo", "cy"]);
    }

    #[test]
    fn test_resume_partner_selected_after_directory() {
        let me = Identity {
            id: UserId(1),
            username: "ana".into(),
        };
        let mut s = ChatSession::new(me, PREFIX.into());
        let effects = s.on_directory(vec![user(2, "bo")], Some(UserId(2)));
        assert_eq!(
            effects,
            vec![Effect::ResolveConversation {
                seq: 1,
                partner: UserId(2)
            }]
        );
        assert_eq!(s.highlighted(), Some(UserId(2)));
    }

    #[test]
    fn test_resume_partner_missing_from_directory() {
        let me = Identity {
            id: UserId(1),
            username: "ana".into(),
        };
        let mut s = ChatSession::new(me, PREFIX.into());
        assert!(s
            .on_directory(vec![user(2, "bo")], Some(UserId(9)))
            .is_empty());
        assert_eq!(s.highlighted(), None);
    }

    #[test]
    fn test_select_joins_room_and_fetches_history() {
        let mut s = session();
        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        assert_eq!(s.view(), &MessageView::Loading);
        assert_eq!(s.highlighted(), Some(UserId(2)));

        let effects = s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(10),
            }),
        );
        assert_eq!(
            effects,
            vec![
                Effect::JoinRoom(ConversationId(10)),
                Effect::FetchHistory(ConversationId(10)),
                Effect::RememberPartner(Some(UserId(2))),
            ]
        );
        assert_eq!(s.active_id(), Some(ConversationId(10)));

        let bo = user(2, "bo");
        s.on_history(ConversationId(10), Ok(vec![message(1, 10, &bo, "hi")]));
        assert_eq!(s.view().messages().len(), 1);
        assert_eq!(s.view().messages()[0].direction, Direction::Received);
    }

    #[test]
    fn test_reselecting_active_user_does_not_rejoin() {
        let mut s = session();
        let bo = user(2, "bo");
        open(&mut s, 2, 10, vec![message(1, 10, &bo, "hi")]);

        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        // The view stays as it was while the lookup runs.
        assert_eq!(s.view().messages().len(), 1);

        let effects = s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(10),
            }),
        );
        assert_eq!(effects, vec![Effect::RememberPartner(Some(UserId(2)))]);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::JoinRoom(_) | Effect::FetchHistory(_))));
        assert_eq!(s.view().messages().len(), 1);
    }

    #[test]
    fn test_superseded_selection_is_dropped() {
        let mut s = session();
        let first = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        let second = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(3))));

        // The later click resolves first.
        let effects = s.on_conversation(
            second,
            Ok(Conversation {
                id: ConversationId(30),
            }),
        );
        assert!(effects.contains(&Effect::JoinRoom(ConversationId(30))));

        // The earlier click's answer arrives late and must not win.
        assert!(s
            .on_conversation(
                first,
                Ok(Conversation {
                    id: ConversationId(20),
                }),
            )
            .is_empty());
        assert_eq!(s.active().unwrap().partner.username, "cy");
        assert_eq!(s.active_id(), Some(ConversationId(30)));
    }

    #[test]
    fn test_message_for_other_conversation_ignored() {
        let mut s = session();
        let bo = user(2, "bo");
        open(&mut s, 2, 10, vec![]);

        let before = s.view().clone();
        assert!(!s.on_message(message(5, 11, &bo, "elsewhere")));
        assert_eq!(s.view(), &before);

        let mut no_conversation = message(6, 10, &bo, "?");
        no_conversation.conversation = None;
        assert!(!s.on_message(no_conversation));
        assert_eq!(s.view(), &before);
    }

    #[test]
    fn test_message_without_active_conversation_ignored() {
        let mut s = session();
        let bo = user(2, "bo");
        assert!(!s.on_message(message(5, 10, &bo, "hi")));
        assert_eq!(s.view(), &MessageView::Idle);
    }

    #[test]
    fn test_incoming_message_classified_once() {
        let mut s = session();
        let bo = user(2, "bo");
        open(&mut s, 2, 10, vec![]);

        let url = format!("{}1-2-cat.png", PREFIX);
        assert!(s.on_message(message(7, 10, &bo, &url)));
        assert_eq!(
            s.view().messages()[0].content,
            Content::Image { url: url.clone() }
        );
    }

    #[test]
    fn test_switching_partner_drops_old_room_messages() {
        let mut s = session();
        let bo = user(2, "bo");
        open(&mut s, 2, 10, vec![]);

        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(3))));
        // Still resolving: a late message from the old room must not show up.
        assert!(!s.on_message(message(8, 10, &bo, "old room")));
        s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(30),
            }),
        );
        s.on_history(ConversationId(30), Ok(vec![]));
        assert!(s.view().messages().is_empty());
    }

    #[test]
    fn test_messages_during_history_load_are_appended_once() {
        let mut s = session();
        let bo = user(2, "bo");
        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(10),
            }),
        );

        // One message is also in the history, one is genuinely new.
        assert!(!s.on_message(message(2, 10, &bo, "dup")));
        assert!(!s.on_message(message(3, 10, &bo, "new")));

        s.on_history(
            ConversationId(10),
            Ok(vec![message(1, 10, &bo, "a"), message(2, 10, &bo, "dup")]),
        );
        let contents: Vec<String> = s
            .view()
            .messages()
            .iter()
            .map(|m| m.content.to_string())
            .collect();
        assert_eq!(contents, vec!["a", "dup", "new"]);
    }

    #[test]
    fn test_conversation_failure_shows_error() {
        let mut s = session();
        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        assert!(s.on_conversation(seq, Err(anyhow!("HTTP 500"))).is_empty());
        assert_eq!(s.view(), &MessageView::Error("Error loading chat."));
        // Highlighting stays even though nothing loaded.
        assert_eq!(s.highlighted(), Some(UserId(2)));
    }

    #[test]
    fn test_history_failure_shows_error() {
        let mut s = session();
        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(10),
            }),
        );
        s.on_history(ConversationId(10), Err(anyhow!("timeout")));
        assert_eq!(
            s.view(),
            &MessageView::Error("Could not load message history.")
        );
    }

    #[test]
    fn test_message_after_history_failure_is_shown() {
        let mut s = session();
        let me = user(1, "ana");
        let bo = user(2, "bo");
        let seq = resolve_seq(&s.dispatch(Intent::SelectUser(UserId(2))));
        s.on_conversation(
            seq,
            Ok(Conversation {
                id: ConversationId(10),
            }),
        );
        s.on_history(ConversationId(10), Err(anyhow!("503")));
        assert!(matches!(
            s.dispatch(Intent::Send("hello".into())).as_slice(),
            [Effect::Publish(_)]
        ));

        assert!(!s.on_message(message(4, 11, &bo, "elsewhere")));
        assert!(s.on_message(message(5, 10, &me, "hello")));
        assert!(s.on_message(message(6, 10, &bo, "hey")));

        let messages = s.view().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].direction, Direction::Sent);
        assert_eq!(messages[1].direction, Direction::Received);
        assert_eq!(s.active_id(), Some(ConversationId(10)));
    }

    #[test]
    fn test_send_requires_content_and_conversation() {
        let mut s = session();
        assert!(s.dispatch(Intent::Send("hello".into())).is_empty());

        open(&mut s, 2, 10, vec![]);
        assert!(s.dispatch(Intent::Send("   ".into())).is_empty());
        assert_eq!(
            s.dispatch(Intent::Send(" hello ".into())),
            vec![Effect::Publish(OutgoingMessage {
                content: "hello".into(),
                user_id: UserId(1),
                conversation_id: ConversationId(10),
            })]
        );
        // No local echo: the view only changes when the server echoes back.
        assert!(s.view().messages().is_empty());
    }

    #[test]
    fn test_attach_requires_active_conversation() {
        let mut s = session();
        let path = PathBuf::from("/tmp/cat.png");
        assert!(s.dispatch(Intent::Attach(path.clone())).is_empty());

        open(&mut s, 2, 10, vec![]);
        assert_eq!(
            s.dispatch(Intent::Attach(path.clone())),
            vec![Effect::Upload {
                conversation: ConversationId(10),
                path
            }]
        );
    }

    #[test]
    fn test_upload_result() {
        let mut s = session();
        let url = format!("{}1-2-cat.png", PREFIX);
        assert_eq!(
            s.on_upload(ConversationId(10), Ok(url.clone())),
            vec![Effect::Publish(OutgoingMessage {
                content: url,
                user_id: UserId(1),
                conversation_id: ConversationId(10),
            })]
        );
        assert_eq!(
            s.on_upload(ConversationId(10), Err(anyhow!("413"))),
            vec![Effect::Alert("File upload failed.".into())]
        );
    }

    #[test]
    fn test_back_clears_selection() {
        let mut s = session();
        open(&mut s, 2, 10, vec![]);
        assert!(s.shows_chat());

        assert!(s.dispatch(Intent::Back).is_empty());
        assert_eq!(s.active(), None);
        assert_eq!(s.highlighted(), None);
        assert_eq!(s.view(), &MessageView::Idle);
        assert!(!s.shows_chat());
    }

    #[test]
    fn test_resize_toggles_narrow_layout() {
        let mut s = session();
        s.dispatch(Intent::Resize {
            width: 50,
            height: 30,
        });
        assert!(s.is_narrow());
        s.dispatch(Intent::Resize {
            width: 120,
            height: 30,
        });
        assert!(!s.is_narrow());
    }

    #[test]
    fn test_logout_intent() {
        let mut s = session();
        assert_eq!(s.dispatch(Intent::Logout), vec![Effect::Logout]);
    }
}
