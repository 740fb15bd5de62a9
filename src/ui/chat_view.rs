use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::api::models::MessageId;
use crate::feedback::MAX_STARS;
use crate::render::{Bubble, BubbleKind};
use crate::session::{Composer, Pane, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKey {
    Send,
    NewLine,
    BackspaceOnEmpty,
}

type RateHandler = Rc<RefCell<Option<Rc<dyn Fn(MessageId, u8)>>>>;
type CopyHandler = Rc<RefCell<Option<Rc<dyn Fn(MessageId)>>>>;

pub struct ChatView {
    stack: gtk::Stack,
    title: gtk::Label,
    description: gtk::Label,
    messages_box: gtk::Box,
    scroller: gtk::ScrolledWindow,
    input: gtk::TextView,
    send_btn: gtk::Button,
    menu_btn: gtk::MenuButton,
    clear_btn: gtk::Button,
    save_btn: gtk::Button,
    on_rate: RateHandler,
    on_copy: CopyHandler,
    // Set while the view writes the buffer itself.
    syncing: Rc<Cell<bool>>,
}

impl ChatView {
    pub fn new() -> Self {
        let stack = gtk::Stack::new();
        stack.set_transition_type(gtk::StackTransitionType::Crossfade);

        let placeholder = adw::StatusPage::builder()
            .icon_name("chat-bubbles-symbolic")
            .title("No conversation open")
            .description("Pick a bot from the list to start chatting.")
            .build();
        stack.add_named(&placeholder, Some("placeholder"));

        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        // Header: bot name, description and the conversation menu
        let header = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let titles = gtk::Box::new(gtk::Orientation::Vertical, 2);
        titles.set_hexpand(true);
        let title = gtk::Label::new(None);
        title.add_css_class("title-3");
        title.set_halign(gtk::Align::Start);
        let description = gtk::Label::new(None);
        description.add_css_class("dim-label");
        description.set_halign(gtk::Align::Start);
        titles.append(&title);
        titles.append(&description);
        header.append(&titles);

        let menu_box = gtk::Box::new(gtk::Orientation::Vertical, 4);
        let clear_btn = gtk::Button::with_label("Clear conversation");
        clear_btn.add_css_class("flat");
        let save_btn = gtk::Button::with_label("Save conversation");
        save_btn.add_css_class("flat");
        menu_box.append(&clear_btn);
        menu_box.append(&save_btn);
        let popover = gtk::Popover::new();
        popover.set_child(Some(&menu_box));
        let menu_btn = gtk::MenuButton::builder()
            .icon_name("view-more-symbolic")
            .popover(&popover)
            .build();
        header.append(&menu_btn);
        root.append(&header);

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        // Input row
        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let input = gtk::TextView::new();
        input.set_hexpand(true);
        input.set_wrap_mode(gtk::WrapMode::WordChar);
        input.add_css_class("card");
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        send_btn.set_valign(gtk::Align::End);
        input_row.append(&input);
        input_row.append(&send_btn);
        root.append(&input_row);

        stack.add_named(&root, Some("chat"));
        stack.set_visible_child_name("placeholder");

        Self {
            stack,
            title,
            description,
            messages_box,
            scroller,
            input,
            send_btn,
            menu_btn,
            clear_btn,
            save_btn,
            on_rate: Rc::new(RefCell::new(None)),
            on_copy: Rc::new(RefCell::new(None)),
            syncing: Rc::new(Cell::new(false)),
        }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.stack.clone().upcast()
    }

    fn input_text(input: &gtk::TextView) -> String {
        let buffer = input.buffer();
        buffer
            .text(&buffer.start_iter(), &buffer.end_iter(), false)
            .to_string()
    }

    pub fn connect_send(&self, f: impl Fn(String) + 'static) {
        let input = self.input.clone();
        self.send_btn
            .connect_clicked(move |_| f(Self::input_text(&input)));
    }

    /// Reports what the user typed. Writes made by [`ChatView::sync_composer`]
    /// are not reported.
    pub fn connect_changed(&self, f: impl Fn(String) + 'static) {
        let syncing = self.syncing.clone();
        self.input.buffer().connect_changed(move |buffer| {
            if syncing.get() {
                return;
            }
            let text = buffer.text(&buffer.start_iter(), &buffer.end_iter(), false);
            f(text.to_string());
        });
    }

    /// `f` returns true when the key was consumed.
    pub fn connect_key(&self, f: impl Fn(ComposerKey, String) -> bool + 'static) {
        let controller = gtk::EventControllerKey::new();
        let input = self.input.clone();
        controller.connect_key_pressed(move |_, key, _, state| {
            let text = Self::input_text(&input);
            let shift = state.contains(gtk::gdk::ModifierType::SHIFT_MASK);
            let action = match key {
                gtk::gdk::Key::Return | gtk::gdk::Key::KP_Enter if shift => {
                    Some(ComposerKey::NewLine)
                }
                gtk::gdk::Key::Return | gtk::gdk::Key::KP_Enter => Some(ComposerKey::Send),
                gtk::gdk::Key::BackSpace if text.is_empty() => Some(ComposerKey::BackspaceOnEmpty),
                _ => None,
            };
            match action {
                Some(action) if f(action, text) => gtk::glib::Propagation::Stop,
                _ => gtk::glib::Propagation::Proceed,
            }
        });
        self.input.add_controller(controller);
    }

    pub fn connect_clear(&self, f: impl Fn() + 'static) {
        self.clear_btn.connect_clicked(move |_| f());
    }

    pub fn connect_save(&self, f: impl Fn() + 'static) {
        self.save_btn.connect_clicked(move |_| f());
    }

    pub fn connect_rate(&self, f: impl Fn(MessageId, u8) + 'static) {
        *self.on_rate.borrow_mut() = Some(Rc::new(f));
    }

    pub fn connect_copy(&self, f: impl Fn(MessageId) + 'static) {
        *self.on_copy.borrow_mut() = Some(Rc::new(f));
    }

    pub fn clipboard(&self) -> gtk::gdk::Clipboard {
        self.stack.clipboard()
    }

    fn star_row(&self, bubble: &Bubble, id: MessageId) -> gtk::Box {
        let row = gtk::Box::new(gtk::Orientation::Horizontal, 0);
        row.set_tooltip_text(Some("Rate the response"));
        let stars = bubble.stars.unwrap_or_default();
        for star in 1..=MAX_STARS {
            let active = stars.is_active(star);
            let btn = gtk::Button::with_label(if active { "★" } else { "☆" });
            btn.add_css_class("flat");
            if active {
                btn.add_css_class("active");
            }
            let on_rate = self.on_rate.clone();
            btn.connect_clicked(move |_| {
                let handler = on_rate.borrow().clone();
                if let Some(handler) = handler {
                    handler(id, star);
                }
            });
            row.append(&btn);
        }
        row
    }

    fn bubble_widget(&self, bubble: &Bubble) -> gtk::Box {
        let outer = gtk::Box::new(gtk::Orientation::Vertical, 2);
        let align = match bubble.kind {
            BubbleKind::Sent => gtk::Align::End,
            BubbleKind::Received => gtk::Align::Start,
        };
        outer.set_halign(align);

        let text = gtk::Label::new(Some(&bubble.lines().join("\n")));
        text.set_wrap(true);
        text.set_selectable(true);
        text.set_xalign(0.0);
        text.set_max_width_chars(60);
        text.add_css_class("card");
        outer.append(&text);

        if let (BubbleKind::Received, Some(id)) = (bubble.kind, bubble.message_id) {
            let actions = gtk::Box::new(gtk::Orientation::Horizontal, 4);
            actions.append(&self.star_row(bubble, id));
            let copy_btn = gtk::Button::from_icon_name("edit-copy-symbolic");
            copy_btn.add_css_class("flat");
            copy_btn.set_tooltip_text(Some("Copy to clipboard"));
            let on_copy = self.on_copy.clone();
            copy_btn.connect_clicked(move |_| {
                let handler = on_copy.borrow().clone();
                if let Some(handler) = handler {
                    handler(id);
                }
            });
            actions.append(&copy_btn);
            outer.append(&actions);
        }

        let time = gtk::Label::new(Some(&bubble.time));
        time.add_css_class("caption");
        time.add_css_class("dim-label");
        time.set_halign(align);
        outer.append(&time);
        outer
    }

    pub fn render(&self, session: &mut Session) {
        match session.pane() {
            Pane::Placeholder => self.stack.set_visible_child_name("placeholder"),
            Pane::Chat => self.stack.set_visible_child_name("chat"),
        }
        self.title.set_label(&session.header().title);
        self.description.set_label(&session.header().description);
        if session.take_menu_dismissal() {
            self.menu_btn.popdown();
        }

        while let Some(child) = self.messages_box.first_child() {
            self.messages_box.remove(&child);
        }
        for bubble in session.transcript().bubbles() {
            self.messages_box.append(&self.bubble_widget(bubble));
        }

        self.sync_composer(session.composer_mut());

        if session.take_scroll_request() {
            let scroller = self.scroller.clone();
            gtk::glib::idle_add_local_once(move || {
                let adj = scroller.vadjustment();
                adj.set_value(adj.upper());
            });
        }
    }

    pub fn sync_composer(&self, composer: &mut Composer) {
        if composer.take_clear_request() {
            self.syncing.set(true);
            self.input.buffer().set_text("");
            self.syncing.set(false);
        }
        self.input.set_size_request(-1, composer.height() as i32);
        self.input.set_sensitive(composer.is_enabled());
        self.send_btn.set_sensitive(composer.is_enabled());
        if composer.is_enabled() && composer.take_focus_request() {
            self.input.grab_focus();
        }
    }
}
