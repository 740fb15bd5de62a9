use std::path::{Path, PathBuf};

use crate::api::ChatBackend;
use crate::api::models::{
    ConversationData, ConversationId, Export, Message, MessageId, SentData, UserId,
};
use crate::clipboard::Clipboard;
use crate::contacts::{Contact, ContactRegistry, Promotion};
use crate::error::Result;
use crate::feedback::Rating;
use crate::render::{Bubble, Transcript};

pub const COMPOSER_MIN_HEIGHT: u32 = 19;
const COMPOSER_GROW_LIMIT: u32 = 50;
const COMPOSER_STEP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Placeholder,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoConversation,
    Loading,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub description: String,
}

/// The message input and its send button. `text` mirrors the input box as
/// the user types; the box is only written back after a reset.
#[derive(Debug, Clone)]
pub struct Composer {
    text: String,
    height: u32,
    pending: u32,
    focus_requested: bool,
    clear_requested: bool,
}

impl Default for Composer {
    fn default() -> Self {
        Self {
            text: String::new(),
            height: COMPOSER_MIN_HEIGHT,
            pending: 0,
            focus_requested: false,
            clear_requested: false,
        }
    }
}

impl Composer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_enabled(&self) -> bool {
        self.pending == 0
    }

    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    /// True once after each reset, when the input box has to be emptied.
    pub fn take_clear_request(&mut self) -> bool {
        std::mem::take(&mut self.clear_requested)
    }

    pub fn grow(&mut self) {
        if self.height <= COMPOSER_GROW_LIMIT {
            self.height += COMPOSER_STEP;
        }
    }

    pub fn shrink(&mut self) {
        if self.text.is_empty() && self.height > COMPOSER_MIN_HEIGHT {
            self.height = self.height.saturating_sub(COMPOSER_STEP);
        }
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.height = COMPOSER_MIN_HEIGHT;
        self.clear_requested = true;
    }

    fn lock(&mut self) {
        self.pending += 1;
        self.focus_requested = false;
    }

    fn unlock(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    fn focus(&mut self) {
        self.focus_requested = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket {
    seq: u64,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub conversation_id: ConversationId,
    pub text: String,
    pub promotion: Promotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearTicket {
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateTicket {
    pub message_id: MessageId,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTicket {
    pub fullname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    Applied,
    Failed,
    /// A newer view was started before this response arrived.
    Stale,
}

#[derive(Debug)]
pub struct Session {
    conversation_id: Option<ConversationId>,
    user_id: Option<UserId>,
    view_seq: u64,
    loading: bool,
    pane: Pane,
    header: Header,
    transcript: Transcript,
    contacts: ContactRegistry,
    composer: Composer,
    menu_dismissal: bool,
    profile_expanded: bool,
    fullname: String,
    scroll_requested: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ContactRegistry::new())
    }
}

impl Session {
    pub fn new(contacts: ContactRegistry) -> Self {
        Self {
            conversation_id: None,
            user_id: None,
            view_seq: 0,
            loading: false,
            pane: Pane::Placeholder,
            header: Header::default(),
            transcript: Transcript::new(),
            contacts,
            composer: Composer::default(),
            menu_dismissal: false,
            profile_expanded: false,
            fullname: String::new(),
            scroll_requested: false,
        }
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn phase(&self) -> Phase {
        match (self.conversation_id, self.loading) {
            (None, _) => Phase::NoConversation,
            (Some(_), true) => Phase::Loading,
            (Some(_), false) => Phase::Active,
        }
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn contacts(&self) -> &ContactRegistry {
        &self.contacts
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn profile_expanded(&self) -> bool {
        self.profile_expanded
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    pub fn set_fullname(&mut self, fullname: &str) {
        self.fullname = fullname.to_string();
    }

    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// The menu button owns its popover; the session only asks it to close.
    pub fn dismiss_menu(&mut self) {
        self.menu_dismissal = true;
    }

    pub fn take_menu_dismissal(&mut self) -> bool {
        std::mem::take(&mut self.menu_dismissal)
    }

    pub fn toggle_profile(&mut self) {
        self.profile_expanded = !self.profile_expanded;
    }

    pub fn filter_contacts(&mut self, query: &str) {
        self.contacts.filter(query);
    }

    pub fn replace_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts.replace_all(contacts);
    }

    pub fn begin_view(&mut self, id: ConversationId) -> Option<ViewTicket> {
        if self.conversation_id.is_none() {
            self.pane = Pane::Chat;
        }
        if self.conversation_id == Some(id) {
            return None;
        }

        self.contacts.set_active(id);
        self.conversation_id = Some(id);
        self.view_seq += 1;
        self.loading = true;
        self.composer.lock();
        log::debug!("loading conversation {id} (seq {})", self.view_seq);
        Some(ViewTicket {
            seq: self.view_seq,
            conversation_id: id,
        })
    }

    pub fn finish_view(
        &mut self,
        ticket: ViewTicket,
        result: Result<ConversationData>,
    ) -> ViewOutcome {
        self.composer.unlock();
        if ticket.seq != self.view_seq {
            log::debug!(
                "dropping conversation {} response (seq {} < {})",
                ticket.conversation_id,
                ticket.seq,
                self.view_seq
            );
            return ViewOutcome::Stale;
        }
        self.loading = false;

        let outcome = match result {
            Ok(data) => {
                self.apply_conversation(ticket.conversation_id, data);
                ViewOutcome::Applied
            }
            Err(e) => {
                log::warn!("failed to load conversation {}: {e}", ticket.conversation_id);
                ViewOutcome::Failed
            }
        };
        self.composer.focus();
        outcome
    }

    fn apply_conversation(&mut self, id: ConversationId, data: ConversationData) {
        let ConversationData {
            conversation,
            messages,
        } = data;

        self.user_id = Some(conversation.user_id);
        self.header = Header {
            title: conversation.bot.name.clone(),
            description: conversation.bot.description.clone(),
        };

        let mut contact = Contact::new(id, conversation.bot.name);
        contact.description = conversation.bot.description;
        self.contacts.upsert(contact);

        self.transcript.clear();
        for message in &messages {
            self.render(message);
        }
        self.scroll_requested = true;
    }

    fn render(&mut self, message: &Message) {
        self.transcript
            .push(Bubble::from_message(message, self.user_id));
        self.contacts.update_preview(message);
    }

    pub fn begin_send(&mut self, text: &str) -> Option<SendTicket> {
        self.begin_send_at(text, &crate::utils::local_time())
    }

    pub fn begin_send_at(&mut self, text: &str, time: &str) -> Option<SendTicket> {
        if text.trim().is_empty() {
            return None;
        }
        let Some(id) = self.conversation_id else {
            log::debug!("ignoring send with no open conversation");
            return None;
        };
        if !self.composer.is_enabled() {
            log::debug!("ignoring send while a request is in flight");
            return None;
        }

        self.transcript.push(Bubble::outgoing(text, time));
        self.composer.reset();
        self.composer.lock();
        self.contacts.update_preview(&Message::outgoing(text, time));
        let promotion = self.contacts.promote(id);
        self.scroll_requested = true;

        Some(SendTicket {
            conversation_id: id,
            text: text.to_string(),
            promotion,
        })
    }

    pub fn finish_send(&mut self, ticket: SendTicket, result: Result<SentData>) {
        match result {
            Ok(data) => match data.message {
                Some(reply) if self.conversation_id == Some(ticket.conversation_id) => {
                    self.user_id = Some(data.conversation.user_id);
                    self.render(&reply);
                    self.scroll_requested = true;
                }
                Some(_) => log::debug!(
                    "reply for conversation {} arrived after switching away",
                    ticket.conversation_id
                ),
                None => {}
            },
            Err(e) => log::warn!(
                "failed to send message to conversation {}: {e}",
                ticket.conversation_id
            ),
        }
        self.composer.unlock();
        self.composer.focus();
    }

    pub fn begin_clear(&mut self) -> Option<ClearTicket> {
        let ticket = self
            .conversation_id
            .map(|conversation_id| ClearTicket { conversation_id });
        if ticket.is_none() {
            self.composer.focus();
            self.dismiss_menu();
        }
        ticket
    }

    pub fn finish_clear(&mut self, ticket: ClearTicket, result: Result<()>) {
        match result {
            Ok(()) if self.conversation_id == Some(ticket.conversation_id) => {
                self.transcript.clear();
                self.contacts.reset_preview();
                self.composer.reset();
            }
            Ok(()) => {}
            Err(e) => log::warn!(
                "failed to clear conversation {}: {e}",
                ticket.conversation_id
            ),
        }
        self.composer.focus();
        self.dismiss_menu();
    }

    pub fn begin_save(&mut self) -> Option<SaveTicket> {
        self.dismiss_menu();
        self.conversation_id
            .map(|conversation_id| SaveTicket { conversation_id })
    }

    pub fn finish_save(&mut self, ticket: SaveTicket, result: Result<Export>) -> Option<Export> {
        match result {
            Ok(export) => Some(export),
            Err(e) => {
                log::warn!(
                    "failed to save conversation {}: {e}",
                    ticket.conversation_id
                );
                None
            }
        }
    }

    pub fn begin_rate(&mut self, message_id: MessageId, star: u8) -> Option<RateTicket> {
        match Rating::new(star) {
            Ok(rating) => Some(RateTicket { message_id, rating }),
            Err(e) => {
                log::debug!("ignoring rating for message {message_id}: {e}");
                None
            }
        }
    }

    /// Stars only move once the backend confirms the rating.
    pub fn finish_rate(&mut self, ticket: RateTicket, result: Result<()>) -> bool {
        match result {
            Ok(()) => self
                .transcript
                .apply_rating(ticket.message_id, ticket.rating),
            Err(e) => {
                log::warn!("failed to rate message {}: {e}", ticket.message_id);
                false
            }
        }
    }

    pub fn begin_rename(&mut self, fullname: &str) -> Option<RenameTicket> {
        let fullname = fullname.trim();
        if fullname.is_empty() {
            return None;
        }
        Some(RenameTicket {
            fullname: fullname.to_string(),
        })
    }

    pub fn finish_rename(&mut self, ticket: RenameTicket, result: Result<()>) {
        match result {
            Ok(()) => self.fullname = ticket.fullname,
            Err(e) => log::warn!("failed to update name: {e}"),
        }
    }

    pub fn copy(&self, message_id: MessageId, clipboard: &dyn Clipboard) -> bool {
        let Some(bubble) = self.transcript.find(message_id) else {
            return false;
        };
        match clipboard.write_text(&bubble.copy_text()) {
            Ok(()) => {
                log::debug!("copied message {message_id} to clipboard");
                true
            }
            Err(e) => {
                log::warn!("unable to write to clipboard: {e}");
                false
            }
        }
    }

    pub async fn view<B: ChatBackend + ?Sized>(
        &mut self,
        backend: &B,
        id: ConversationId,
    ) -> Option<ViewOutcome> {
        let ticket = self.begin_view(id)?;
        let result = backend.fetch_conversation(id).await;
        Some(self.finish_view(ticket, result))
    }

    pub async fn send<B: ChatBackend + ?Sized>(&mut self, backend: &B, text: &str) -> bool {
        let Some(ticket) = self.begin_send(text) else {
            return false;
        };
        let result = backend
            .send_message(ticket.conversation_id, &ticket.text)
            .await;
        self.finish_send(ticket, result);
        true
    }

    pub async fn clear<B: ChatBackend + ?Sized>(&mut self, backend: &B) {
        if let Some(ticket) = self.begin_clear() {
            let result = backend.clear_conversation(ticket.conversation_id).await;
            self.finish_clear(ticket, result);
        }
    }

    pub async fn save<B: ChatBackend + ?Sized>(
        &mut self,
        backend: &B,
        dir: &Path,
    ) -> Option<PathBuf> {
        let ticket = self.begin_save()?;
        let result = backend.save_conversation(ticket.conversation_id).await;
        let export = self.finish_save(ticket, result)?;
        match crate::storage::write_export(dir, &export) {
            Ok(path) => {
                log::info!("saved conversation to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("failed to write export {}: {e}", export.filename);
                None
            }
        }
    }

    pub async fn rate<B: ChatBackend + ?Sized>(
        &mut self,
        backend: &B,
        message_id: MessageId,
        star: u8,
    ) -> bool {
        let Some(ticket) = self.begin_rate(message_id, star) else {
            return false;
        };
        let result = backend.set_feedback(ticket.message_id, ticket.rating).await;
        self.finish_rate(ticket, result)
    }

    pub async fn rename<B: ChatBackend + ?Sized>(&mut self, backend: &B, fullname: &str) {
        if let Some(ticket) = self.begin_rename(fullname) {
            let result = backend.update_fullname(&ticket.fullname).await;
            self.finish_rename(ticket, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{Bot, Conversation, SenderType};
    use crate::clipboard::MemoryClipboard;
    use crate::error::ClientError;
    use crate::render::BubbleKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ME: UserId = 1;

    fn conversation(id: ConversationId, name: &str) -> Conversation {
        Conversation {
            id,
            bot: Bot {
                id: Some(100 + id),
                name: name.into(),
                description: format!("{name} bot"),
            },
            user_id: ME,
        }
    }

    fn message(id: MessageId, sender_type: SenderType, text: &str) -> Message {
        let sender_id = match sender_type {
            SenderType::User => ME,
            SenderType::Bot => 100,
        };
        Message {
            id: Some(id),
            sender_type,
            sender_id: Some(sender_id),
            ..Message::outgoing(text, "10:00 AM")
        }
    }

    fn failure() -> ClientError {
        ClientError::Status {
            endpoint: "/test".into(),
            status: 500,
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        conversations: HashMap<ConversationId, Vec<Message>>,
        reply: Option<String>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with(id: ConversationId, messages: Vec<Message>) -> Self {
            let mut backend = Self::default();
            backend.conversations.insert(id, messages);
            backend
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail { Err(failure()) } else { Ok(()) }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn fetch_conversation(&self, id: ConversationId) -> Result<ConversationData> {
            self.record(format!("GET /conversation/{id}"))?;
            Ok(ConversationData {
                conversation: conversation(id, &format!("Bot{id}")),
                messages: self.conversations.get(&id).cloned().unwrap_or_default(),
            })
        }

        async fn send_message(&self, id: ConversationId, text: &str) -> Result<SentData> {
            self.record(format!("POST /conversation/{id} {text}"))?;
            Ok(SentData {
                conversation: conversation(id, &format!("Bot{id}")),
                message: self
                    .reply
                    .as_ref()
                    .map(|r| message(999, SenderType::Bot, r)),
            })
        }

        async fn set_feedback(&self, message_id: MessageId, rating: Rating) -> Result<()> {
            self.record(format!("POST /feedback/{message_id} {}", rating.get()))
        }

        async fn clear_conversation(&self, id: ConversationId) -> Result<()> {
            self.record(format!("GET /clear_conversation/{id}"))
        }

        async fn save_conversation(&self, id: ConversationId) -> Result<Export> {
            self.record(format!("GET /save_conversation/{id}"))?;
            Ok(Export {
                filename: format!("chatbot_Bot{id}_{id}.csv"),
                bytes: b"id,message\n".to_vec(),
            })
        }

        async fn update_fullname(&self, fullname: &str) -> Result<()> {
            self.record(format!("POST /user/update {fullname}"))
        }
    }

    fn session() -> Session {
        Session::new(ContactRegistry::with_contacts(vec![
            Contact::new(1, "Bot1"),
            Contact::new(2, "Bot2"),
            Contact::new(3, "Bot3"),
        ]))
    }

    fn history() -> Vec<Message> {
        vec![
            message(10, SenderType::User, "hi"),
            message(11, SenderType::Bot, "hello"),
            message(12, SenderType::User, "how are you?"),
        ]
    }

    #[tokio::test]
    async fn view_renders_returned_messages_in_order() {
        let backend = FakeBackend::with(2, history());
        let mut s = session();
        assert_eq!(s.phase(), Phase::NoConversation);
        assert_eq!(s.pane(), Pane::Placeholder);

        assert_eq!(s.view(&backend, 2).await, Some(ViewOutcome::Applied));

        assert_eq!(s.conversation_id(), Some(2));
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.pane(), Pane::Chat);
        assert_eq!(s.header().title, "Bot2");
        let kinds: Vec<_> = s.transcript().bubbles().iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![BubbleKind::Sent, BubbleKind::Received, BubbleKind::Sent]
        );
        let ids: Vec<_> = s
            .transcript()
            .bubbles()
            .iter()
            .map(|b| b.message_id)
            .collect();
        assert_eq!(ids, vec![Some(10), Some(11), Some(12)]);
        assert_eq!(s.contacts().active(), Some(2));
        assert_eq!(
            s.contacts().get(2).unwrap().preview.label(),
            "You: how are you?"
        );
        assert!(s.composer().is_enabled());
        assert!(s.composer_mut().take_focus_request());
        assert!(s.take_scroll_request());
        assert!(!s.take_scroll_request());
    }

    #[tokio::test]
    async fn viewing_the_open_conversation_again_sends_nothing() {
        let backend = FakeBackend::with(2, history());
        let mut s = session();
        s.view(&backend, 2).await;
        assert_eq!(s.view(&backend, 2).await, None);
        assert_eq!(backend.calls(), vec!["GET /conversation/2"]);
    }

    #[tokio::test]
    async fn failed_view_leaves_the_composer_usable() {
        let backend = FakeBackend::failing();
        let mut s = session();
        assert_eq!(s.view(&backend, 1).await, Some(ViewOutcome::Failed));
        assert_eq!(s.conversation_id(), Some(1));
        assert!(s.transcript().is_empty());
        assert!(s.composer().is_enabled());
        assert!(s.composer_mut().take_focus_request());
    }

    #[test]
    fn stale_view_response_is_discarded() {
        let mut s = session();
        let first = s.begin_view(1).unwrap();
        let second = s.begin_view(2).unwrap();
        assert_eq!(s.phase(), Phase::Loading);
        assert!(!s.composer().is_enabled());

        let late = ConversationData {
            conversation: conversation(1, "Bot1"),
            messages: vec![message(1, SenderType::Bot, "from one")],
        };
        assert_eq!(s.finish_view(first, Ok(late)), ViewOutcome::Stale);
        assert!(s.transcript().is_empty());
        assert!(!s.composer().is_enabled());

        let fresh = ConversationData {
            conversation: conversation(2, "Bot2"),
            messages: vec![message(2, SenderType::Bot, "from two")],
        };
        assert_eq!(s.finish_view(second, Ok(fresh)), ViewOutcome::Applied);
        assert_eq!(s.header().title, "Bot2");
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.transcript().bubbles()[0].copy_text(), "from two");
        assert!(s.composer().is_enabled());
        assert_eq!(s.phase(), Phase::Active);
    }

    #[tokio::test]
    async fn whitespace_is_never_sent() {
        let backend = FakeBackend::with(1, vec![]);
        let mut s = session();
        s.view(&backend, 1).await;
        for text in ["", "   ", "\n\t \r\n"] {
            assert!(!s.send(&backend, text).await);
            assert!(s.begin_rename(text).is_none());
            s.rename(&backend, text).await;
        }
        assert_eq!(backend.calls(), vec!["GET /conversation/1"]);
        assert!(s.transcript().is_empty());
    }

    #[tokio::test]
    async fn send_without_open_conversation_is_ignored() {
        let backend = FakeBackend::default();
        let mut s = session();
        assert!(!s.send(&backend, "hello").await);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn sending_multiline_text_updates_bubble_preview_and_order() {
        let backend = FakeBackend {
            reply: Some("Nice to meet you".into()),
            ..FakeBackend::with(3, vec![])
        };
        let mut s = session();
        s.view(&backend, 3).await;
        s.composer_mut().set_text("hello\nworld");
        s.composer_mut().grow();

        let ticket = s.begin_send_at("hello\nworld", "9:41 AM").unwrap();
        assert_eq!(ticket.promotion, Promotion::Moved);
        assert_eq!(s.contacts().ids(), vec![3, 1, 2]);
        assert!(!s.composer().is_enabled());
        assert_eq!(s.composer().text(), "");
        assert_eq!(s.composer().height(), COMPOSER_MIN_HEIGHT);

        let sent = &s.transcript().bubbles()[0];
        assert_eq!(sent.kind, BubbleKind::Sent);
        assert_eq!(sent.lines(), vec!["hello", "world"]);
        assert_eq!(sent.time, "9:41 AM");

        let contact = s.contacts().get(3).unwrap();
        assert_eq!(contact.preview.title(), "hello\nworld");
        assert_eq!(contact.preview.label(), "You: hello\nworld");

        assert!(s.begin_send_at("again", "9:42 AM").is_none());

        let result = backend.send_message(3, &ticket.text).await;
        s.finish_send(ticket, result);
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.transcript().bubbles()[1].kind, BubbleKind::Received);
        assert_eq!(
            s.contacts().get(3).unwrap().preview.label(),
            "Nice to meet you"
        );
        assert!(s.composer().is_enabled());
        assert!(s.composer_mut().take_focus_request());
        assert_eq!(
            backend.calls(),
            vec!["GET /conversation/3", "POST /conversation/3 hello\nworld"]
        );
    }

    #[tokio::test]
    async fn send_failure_keeps_the_optimistic_bubble() {
        let mut s = session();
        s.view(&FakeBackend::with(1, vec![]), 1).await;
        assert!(s.send(&FakeBackend::failing(), "still here").await);
        assert_eq!(s.transcript().len(), 1);
        assert!(s.composer().is_enabled());
    }

    #[tokio::test]
    async fn rating_applies_only_after_acknowledgement() {
        let messages = vec![message(42, SenderType::Bot, "answer")];
        let mut s = session();
        s.view(&FakeBackend::with(1, messages), 1).await;

        let failing = FakeBackend::failing();
        assert!(!s.rate(&failing, 42, 3).await);
        assert_eq!(
            s.transcript().find(42).unwrap().stars.unwrap().stars(),
            [false; 5]
        );

        let ok = FakeBackend::default();
        assert!(s.rate(&ok, 42, 3).await);
        assert_eq!(
            s.transcript().find(42).unwrap().stars.unwrap().stars(),
            [true, true, true, false, false]
        );
        assert_eq!(ok.calls(), vec!["POST /feedback/42 3"]);

        assert!(!s.rate(&ok, 42, 0).await);
        assert!(!s.rate(&ok, 42, 6).await);
        assert_eq!(ok.calls().len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_transcript_and_resets_preview() {
        let backend = FakeBackend::with(2, history());
        let mut s = session();
        s.view(&backend, 2).await;
        s.composer_mut().set_text("draft");

        s.clear(&backend).await;
        assert!(s.transcript().is_empty());
        assert_eq!(s.contacts().get(2).unwrap().preview.label(), "No messages yet");
        assert_eq!(s.composer().text(), "");
        assert!(s.composer_mut().take_clear_request());
        assert!(s.take_menu_dismissal());
        assert!(s.composer_mut().take_focus_request());
    }

    #[tokio::test]
    async fn failed_clear_still_closes_the_menu() {
        let mut s = session();
        s.view(&FakeBackend::with(2, history()), 2).await;
        s.clear(&FakeBackend::failing()).await;
        assert_eq!(s.transcript().len(), 3);
        assert!(s.take_menu_dismissal());
    }

    #[tokio::test]
    async fn save_writes_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::with(2, history());
        let mut s = session();
        assert!(s.save(&backend, dir.path()).await.is_none());

        s.view(&backend, 2).await;
        let path = s.save(&backend, dir.path()).await.unwrap();
        assert!(s.take_menu_dismissal());
        assert_eq!(path.file_name().unwrap(), "chatbot_Bot2_2.csv");
        assert_eq!(std::fs::read(path).unwrap(), b"id,message\n");
    }

    #[tokio::test]
    async fn rename_updates_name_on_success_only() {
        let mut s = session();
        s.set_fullname("Ada");
        s.rename(&FakeBackend::failing(), "Grace").await;
        assert_eq!(s.fullname(), "Ada");
        s.rename(&FakeBackend::default(), "  Grace Hopper ").await;
        assert_eq!(s.fullname(), "Grace Hopper");
    }

    #[tokio::test]
    async fn copy_restores_line_breaks() {
        let messages = vec![message(5, SenderType::Bot, "line one\nline two")];
        let mut s = session();
        s.view(&FakeBackend::with(1, messages), 1).await;
        let clipboard = MemoryClipboard::new();
        assert!(s.copy(5, &clipboard));
        assert_eq!(clipboard.contents().as_deref(), Some("line one\nline two"));
        assert!(!s.copy(6, &clipboard));
    }

    #[test]
    fn composer_resizes_within_bounds() {
        let mut c = Composer::default();
        for _ in 0..10 {
            c.grow();
        }
        assert_eq!(c.height(), 59);
        c.set_text("x");
        c.shrink();
        assert_eq!(c.height(), 59);
        c.set_text("");
        for _ in 0..10 {
            c.shrink();
        }
        assert_eq!(c.height(), COMPOSER_MIN_HEIGHT);
    }
    fn loaded(id: ConversationId, messages: Vec<Message>) -> ConversationData {
        ConversationData {
            conversation: conversation(id, &format!("Bot{id}")),
            messages,
        }
    }

    fn open(s: &mut Session, id: ConversationId) {
        let ticket = s.begin_view(id).unwrap();
        s.finish_view(ticket, Ok(loaded(id, vec![])));
    }

    #[test]
    fn focus_is_requested_once_per_completion() {
        let mut s = session();
        open(&mut s, 1);
        assert!(s.composer_mut().take_focus_request());

        s.filter_contacts("bot");
        s.toggle_profile();
        assert!(!s.composer_mut().take_focus_request());
        assert!(!s.composer_mut().take_clear_request());
    }

    #[test]
    fn rejected_draft_stays_in_the_composer() {
        let mut s = session();
        open(&mut s, 1);
        s.composer_mut().grow();
        s.composer_mut().set_text("   ");

        assert!(s.begin_send("   ").is_none());
        assert_eq!(s.composer().text(), "   ");
        assert!(!s.composer_mut().take_clear_request());

        s.composer_mut().shrink();
        assert_eq!(s.composer().height(), COMPOSER_MIN_HEIGHT + 10);
        s.composer_mut().set_text("");
        s.composer_mut().shrink();
        assert_eq!(s.composer().height(), COMPOSER_MIN_HEIGHT);

        s.composer_mut().set_text("hi");
        assert!(s.begin_send("hi").is_some());
        assert!(s.composer_mut().take_clear_request());
        assert!(!s.composer_mut().take_clear_request());
    }

    #[test]
    fn reply_after_switching_away_is_dropped() {
        let mut s = session();
        open(&mut s, 1);
        let send = s.begin_send_at("ping", "9:00 AM").unwrap();
        let view = s.begin_view(2).unwrap();
        assert!(!s.composer().is_enabled());

        let reply = SentData {
            conversation: conversation(1, "Bot1"),
            message: Some(message(50, SenderType::Bot, "pong")),
        };
        s.finish_send(send, Ok(reply));
        assert!(!s.composer().is_enabled());
        assert!(s.transcript().find(50).is_none());
        assert_eq!(s.contacts().get(1).unwrap().preview.label(), "You: ping");
        assert_eq!(s.contacts().get(2).unwrap().preview.label(), "No messages yet");

        let history = vec![message(60, SenderType::Bot, "from two")];
        assert_eq!(s.finish_view(view, Ok(loaded(2, history))), ViewOutcome::Applied);
        assert!(s.composer().is_enabled());
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.transcript().bubbles()[0].copy_text(), "from two");
        assert_eq!(s.contacts().get(1).unwrap().preview.label(), "You: ping");
        assert_eq!(s.contacts().get(2).unwrap().preview.label(), "from two");
    }

    #[test]
    fn composer_unlocks_whichever_request_finishes_last() {
        let mut s = session();
        open(&mut s, 1);
        let send = s.begin_send_at("ping", "9:00 AM").unwrap();
        let view = s.begin_view(2).unwrap();

        s.finish_view(view, Ok(loaded(2, vec![])));
        assert!(!s.composer().is_enabled());
        assert!(s.transcript().is_empty());

        s.finish_send(send, Err(failure()));
        assert!(s.composer().is_enabled());
        assert!(s.transcript().is_empty());
        assert_eq!(s.contacts().get(1).unwrap().preview.label(), "You: ping");
    }

    #[test]
    fn clear_result_for_a_closed_conversation_is_ignored() {
        let mut s = session();
        open(&mut s, 1);
        let clear = s.begin_clear().unwrap();
        let view = s.begin_view(2).unwrap();
        let history = vec![message(70, SenderType::User, "kept")];
        s.finish_view(view, Ok(loaded(2, history)));

        s.finish_clear(clear, Ok(()));
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.contacts().get(2).unwrap().preview.label(), "You: kept");
        assert!(s.composer().is_enabled());
        assert!(s.take_menu_dismissal());
    }
}
