use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;

use crate::api::models::ConversationId;
use crate::contacts::{Contact, ContactRegistry};

type Handler<T> = Rc<RefCell<Option<Rc<dyn Fn(T)>>>>;

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    search: gtk::SearchEntry,
    profile: gtk::Revealer,
    expand_btn: gtk::Button,
    fullname: gtk::Entry,
    fullname_label: gtk::Label,
    on_select: Handler<ConversationId>,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(260);

        let profile_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let fullname_label = gtk::Label::new(None);
        fullname_label.add_css_class("heading");
        fullname_label.set_halign(gtk::Align::Start);
        fullname_label.set_hexpand(true);
        let expand_btn = gtk::Button::from_icon_name("pan-down-symbolic");
        expand_btn.add_css_class("flat");
        expand_btn.set_tooltip_text(Some("Profile"));
        profile_row.append(&fullname_label);
        profile_row.append(&expand_btn);
        root.append(&profile_row);

        let fullname = gtk::Entry::new();
        fullname.set_placeholder_text(Some("Full name"));
        let profile = gtk::Revealer::builder()
            .transition_type(gtk::RevealerTransitionType::SlideDown)
            .child(&fullname)
            .build();
        root.append(&profile);

        let search = gtk::SearchEntry::new();
        search.set_placeholder_text(Some("Search bots…"));
        root.append(&search);

        let title = gtk::Label::new(Some("Conversations"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .child(&list)
            .build();
        root.append(&scroller);

        let on_select: Handler<ConversationId> = Rc::new(RefCell::new(None));
        {
            let on_select = on_select.clone();
            list.connect_row_activated(move |_, row| {
                let Ok(id) = row.widget_name().parse::<ConversationId>() else {
                    return;
                };
                let handler = on_select.borrow().clone();
                if let Some(handler) = handler {
                    handler(id);
                }
            });
        }

        Self {
            root,
            list,
            search,
            profile,
            expand_btn,
            fullname,
            fullname_label,
            on_select,
        }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn connect_selected(&self, f: impl Fn(ConversationId) + 'static) {
        *self.on_select.borrow_mut() = Some(Rc::new(f));
    }

    pub fn connect_search(&self, f: impl Fn(String) + 'static) {
        self.search
            .connect_search_changed(move |entry| f(entry.text().to_string()));
    }

    pub fn connect_rename(&self, f: impl Fn(String) + 'static) {
        self.fullname
            .connect_activate(move |entry| f(entry.text().to_string()));
    }

    pub fn connect_expand(&self, f: impl Fn() + 'static) {
        self.expand_btn.connect_clicked(move |_| f());
    }

    pub fn set_profile(&self, fullname: &str, expanded: bool) {
        self.fullname_label.set_label(fullname);
        self.fullname.set_placeholder_text(Some(fullname));
        self.profile.set_reveal_child(expanded);
    }

    fn contact_row(contact: &Contact, active: bool) -> (gtk::ListBoxRow, gtk::Revealer) {
        let row = gtk::ListBoxRow::new();
        row.set_widget_name(&contact.id.to_string());
        if active {
            row.add_css_class("active");
        }

        let body = gtk::Box::new(gtk::Orientation::Vertical, 2);
        body.set_margin_top(8);
        body.set_margin_bottom(8);
        body.set_margin_start(8);
        body.set_margin_end(8);

        let top = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let name = gtk::Label::new(Some(&contact.name));
        name.add_css_class("heading");
        name.set_halign(gtk::Align::Start);
        name.set_hexpand(true);
        let time = gtk::Label::new(Some(&contact.time));
        time.add_css_class("dim-label");
        top.append(&name);
        top.append(&time);
        body.append(&top);

        let preview = gtk::Label::new(Some(&contact.preview.label().replace('\n', " ")));
        preview.add_css_class("dim-label");
        preview.set_halign(gtk::Align::Start);
        preview.set_ellipsize(gtk::pango::EllipsizeMode::End);
        preview.set_tooltip_text(Some(contact.preview.title()));
        body.append(&preview);

        let revealer = gtk::Revealer::builder()
            .transition_type(gtk::RevealerTransitionType::SlideDown)
            .reveal_child(true)
            .child(&body)
            .build();
        row.set_child(Some(&revealer));
        row.set_visible(contact.visible);
        (row, revealer)
    }

    /// Rebuilds the rows from the registry. `promoted` replays the
    /// hide-then-show transition on the contact that just moved to the top.
    pub fn render(&self, contacts: &ContactRegistry, promoted: Option<ConversationId>) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        let active = contacts.active();
        for contact in contacts.iter() {
            let (row, revealer) = Self::contact_row(contact, active == Some(contact.id));
            self.list.append(&row);
            if active == Some(contact.id) {
                self.list.select_row(Some(&row));
            }
            if promoted == Some(contact.id) {
                revealer.set_reveal_child(false);
                gtk::glib::idle_add_local_once(move || revealer.set_reveal_child(true));
            }
        }
    }
}
