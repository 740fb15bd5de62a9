//! Glue between the widgets, the [`Session`] and the backend.
//!
//! Every action follows the same shape: `begin_*` on the session, redraw,
//! run the request on the shared runtime, then `finish_*` and redraw again
//! once the result is back on the main loop.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::api::ChatBackend;
use crate::api::client::ApiClient;
use crate::api::models::{ContactEntry, ConversationId, MessageId};
use crate::app::AppState;
use crate::contacts::{Contact, Promotion};
use crate::profile::ProfileDraft;
use crate::session::Session;
use crate::storage::{self, ContactCache};
use crate::ui::chat_view::{ChatView, ComposerKey};
use crate::ui::sidebar::Sidebar;
use crate::ui::{DisplayClipboard, on_main};
use crate::utils::run_async_to_main;

pub struct Controller {
    session: RefCell<Session>,
    client: Arc<ApiClient>,
    state: AppState,
    cache: RefCell<Option<ContactCache>>,
    pub sidebar: Sidebar,
    pub chat: ChatView,
    overlay: adw::ToastOverlay,
}

fn weak_handler<A: 'static>(
    this: &Rc<Controller>,
    f: impl Fn(&Rc<Controller>, A) + 'static,
) -> Box<dyn Fn(A)> {
    let weak: Weak<Controller> = Rc::downgrade(this);
    Box::new(move |arg| {
        if let Some(this) = weak.upgrade() {
            f(&this, arg);
        }
    })
}

impl Controller {
    pub fn new(state: AppState, client: ApiClient, overlay: adw::ToastOverlay) -> Rc<Self> {
        let cache = match ContactCache::open_default() {
            Ok(cache) => Some(cache),
            Err(e) => {
                log::warn!("contact cache unavailable: {e}");
                None
            }
        };
        let this = Rc::new(Self {
            session: RefCell::new(Session::default()),
            client: Arc::new(client),
            state,
            cache: RefCell::new(cache),
            sidebar: Sidebar::new(),
            chat: ChatView::new(),
            overlay,
        });
        this.wire();
        this
    }

    fn wire(self: &Rc<Self>) {
        self.sidebar
            .connect_selected(weak_handler(self, |c, id: ConversationId| c.view(id)));
        self.sidebar.connect_search(weak_handler(self, |c, query: String| {
            c.session.borrow_mut().filter_contacts(&query);
            c.redraw(None);
        }));
        self.sidebar
            .connect_rename(weak_handler(self, |c, name: String| c.rename(name)));
        let expand = weak_handler(self, |c, ()| {
            c.session.borrow_mut().toggle_profile();
            c.redraw(None);
        });
        self.sidebar.connect_expand(move || expand(()));

        self.chat
            .connect_send(weak_handler(self, |c, text: String| c.send(text)));
        self.chat.connect_changed(weak_handler(self, |c, text: String| {
            c.session.borrow_mut().composer_mut().set_text(&text);
        }));
        let weak = Rc::downgrade(self);
        self.chat.connect_key(move |key, text| {
            let Some(c) = weak.upgrade() else {
                return false;
            };
            match key {
                ComposerKey::Send => {
                    c.send(text);
                    true
                }
                ComposerKey::NewLine => {
                    c.session.borrow_mut().composer_mut().grow();
                    c.sync_composer();
                    false
                }
                ComposerKey::BackspaceOnEmpty => {
                    {
                        let mut session = c.session.borrow_mut();
                        session.composer_mut().set_text(&text);
                        session.composer_mut().shrink();
                    }
                    c.sync_composer();
                    false
                }
            }
        });
        let clear = weak_handler(self, |c, ()| c.clear());
        self.chat.connect_clear(move || clear(()));
        let save = weak_handler(self, |c, ()| c.save());
        self.chat.connect_save(move || save(()));
        let weak = Rc::downgrade(self);
        self.chat.connect_rate(move |id, star| {
            if let Some(c) = weak.upgrade() {
                c.rate(id, star);
            }
        });
        self.chat
            .connect_copy(weak_handler(self, |c, id: MessageId| c.copy(id)));
    }

    fn toast(&self, text: &str) {
        self.overlay.add_toast(adw::Toast::new(text));
    }

    fn redraw(&self, promoted: Option<ConversationId>) {
        let mut session = self.session.borrow_mut();
        self.sidebar
            .set_profile(session.fullname(), session.profile_expanded());
        self.sidebar.render(session.contacts(), promoted);
        self.chat.render(&mut session);
    }

    fn sync_composer(&self) {
        self.chat
            .sync_composer(self.session.borrow_mut().composer_mut());
    }

    fn persist_contacts(&self) {
        let entries: Vec<ContactEntry> = self
            .session
            .borrow()
            .contacts()
            .iter()
            .map(ContactEntry::from)
            .collect();
        if let Some(cache) = self.cache.borrow_mut().as_mut() {
            if let Err(e) = cache.replace_all(&entries) {
                log::warn!("failed to cache contacts: {e}");
            }
        }
    }

    pub fn start(self: &Rc<Self>) {
        if let Some(cache) = self.cache.borrow().as_ref() {
            match cache.load(Some(200)) {
                Ok(cached) if !cached.is_empty() => {
                    let contacts = cached.into_iter().map(Contact::from).collect();
                    self.session.borrow_mut().replace_contacts(contacts);
                }
                Ok(_) => {}
                Err(e) => log::warn!("failed to read cached contacts: {e}"),
            }
        }
        self.redraw(None);
        self.refresh(true);
    }

    fn refresh(self: &Rc<Self>, login_first: bool) {
        let client = self.client.clone();
        let email = self.state.email.clone();
        let password = self.state.password.clone();
        let rx = run_async_to_main(async move {
            if login_first {
                if let Err(e) = client.login(&email, &password).await {
                    return Err(e);
                }
            }
            client.dashboard().await
        });
        let this = self.clone();
        on_main(rx, move |res| match res {
            Ok(dashboard) => {
                {
                    let mut session = this.session.borrow_mut();
                    if let Some(name) = &dashboard.fullname {
                        session.set_fullname(name);
                    }
                    session.replace_contacts(
                        dashboard.contacts.into_iter().map(Contact::from).collect(),
                    );
                }
                this.persist_contacts();
                this.redraw(None);
            }
            Err(e) => {
                log::warn!("failed to load dashboard: {e}");
                this.toast(&format!("Failed to load conversations: {e}"));
            }
        });
    }

    pub fn view(self: &Rc<Self>, id: ConversationId) {
        let ticket = self.session.borrow_mut().begin_view(id);
        self.redraw(None);
        let Some(ticket) = ticket else {
            return;
        };
        let client = self.client.clone();
        let rx = run_async_to_main(async move { client.fetch_conversation(id).await });
        let this = self.clone();
        on_main(rx, move |res| {
            this.session.borrow_mut().finish_view(ticket, res);
            this.persist_contacts();
            this.redraw(None);
        });
    }

    pub fn send(self: &Rc<Self>, text: String) {
        let ticket = {
            let mut session = self.session.borrow_mut();
            session.composer_mut().set_text(&text);
            session.begin_send(&text)
        };
        let Some(ticket) = ticket else {
            return;
        };
        let promoted = match ticket.promotion {
            Promotion::Moved => Some(ticket.conversation_id),
            Promotion::Unchanged => None,
        };
        if let Some(cache) = self.cache.borrow().as_ref() {
            if let Err(e) = cache.touch(ticket.conversation_id) {
                log::debug!("failed to touch cached contact: {e}");
            }
        }
        self.redraw(promoted);

        let client = self.client.clone();
        let (id, body) = (ticket.conversation_id, ticket.text.clone());
        let rx = run_async_to_main(async move { client.send_message(id, &body).await });
        let this = self.clone();
        on_main(rx, move |res| {
            this.session.borrow_mut().finish_send(ticket, res);
            this.persist_contacts();
            this.redraw(None);
        });
    }

    pub fn clear(self: &Rc<Self>) {
        let ticket = self.session.borrow_mut().begin_clear();
        let Some(ticket) = ticket else {
            self.redraw(None);
            return;
        };
        let client = self.client.clone();
        let rx = run_async_to_main(async move {
            client.clear_conversation(ticket.conversation_id).await
        });
        let this = self.clone();
        on_main(rx, move |res| {
            this.session.borrow_mut().finish_clear(ticket, res);
            this.persist_contacts();
            this.redraw(None);
        });
    }

    pub fn save(self: &Rc<Self>) {
        let ticket = self.session.borrow_mut().begin_save();
        self.redraw(None);
        let Some(ticket) = ticket else {
            return;
        };
        let client = self.client.clone();
        let rx = run_async_to_main(async move {
            client.save_conversation(ticket.conversation_id).await
        });
        let this = self.clone();
        let dir = self.state.export_dir();
        on_main(rx, move |res| {
            let export = this.session.borrow_mut().finish_save(ticket, res);
            if let Some(export) = export {
                match storage::write_export(&dir, &export) {
                    Ok(path) => {
                        log::info!("saved conversation to {}", path.display());
                        this.toast(&format!("Saved to {}", path.display()));
                    }
                    Err(e) => log::warn!("failed to write export {}: {e}", export.filename),
                }
            }
        });
    }

    pub fn rate(self: &Rc<Self>, message_id: MessageId, star: u8) {
        let ticket = self.session.borrow_mut().begin_rate(message_id, star);
        let Some(ticket) = ticket else {
            return;
        };
        let client = self.client.clone();
        let rx = run_async_to_main(async move {
            client.set_feedback(ticket.message_id, ticket.rating).await
        });
        let this = self.clone();
        on_main(rx, move |res| {
            if this.session.borrow_mut().finish_rate(ticket, res) {
                this.redraw(None);
            }
        });
    }

    pub fn rename(self: &Rc<Self>, fullname: String) {
        let ticket = self.session.borrow_mut().begin_rename(&fullname);
        let Some(ticket) = ticket else {
            return;
        };
        let client = self.client.clone();
        let name = ticket.fullname.clone();
        let rx = run_async_to_main(async move { client.update_fullname(&name).await });
        let this = self.clone();
        on_main(rx, move |res| {
            this.session.borrow_mut().finish_rename(ticket, res);
            this.redraw(None);
        });
    }

    pub fn copy(&self, message_id: MessageId) {
        let clipboard = DisplayClipboard(self.chat.clipboard());
        self.session.borrow().copy(message_id, &clipboard);
    }

    /// Ends the server session, forgets the stored login and the cached
    /// contacts, then hands control back to `on_done`.
    pub fn logout(self: &Rc<Self>, on_done: impl FnOnce() + 'static) {
        let client = self.client.clone();
        let rx = run_async_to_main(async move { client.logout().await });
        let this = self.clone();
        on_main(rx, move |res| {
            if let Err(e) = res {
                log::warn!("logout request failed: {e}");
            }
            let mut state = this.state.clone();
            state.forget_credentials();
            if let Err(e) = state.save() {
                log::warn!("failed to save settings: {e}");
            }
            if let Some(cache) = this.cache.borrow_mut().as_mut() {
                if let Err(e) = cache.replace_all(&[]) {
                    log::warn!("failed to clear cached contacts: {e}");
                }
            }
            on_done();
        });
    }

    pub fn create_bot(self: &Rc<Self>, draft: ProfileDraft) {
        let client = self.client.clone();
        let rx = run_async_to_main(async move { client.add_conversation(&draft).await });
        let this = self.clone();
        on_main(rx, move |res| match res {
            Ok(()) => this.refresh(false),
            Err(e) => {
                log::warn!("failed to create bot: {e}");
                this.toast(&format!("Failed to create bot: {e}"));
            }
        });
    }
}
