use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;

use crate::profile::ProfileDraft;

pub fn show_new_bot_dialog(
    parent: &impl IsA<gtk::Window>,
    on_create: impl Fn(ProfileDraft) + 'static,
) {
    let dialog = gtk::Dialog::builder()
        .title("New Bot")
        .transient_for(parent)
        .modal(true)
        .build();

    let content = gtk::Box::new(gtk::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let name = gtk::Entry::new();
    name.set_placeholder_text(Some("Bot name"));
    let description = gtk::Entry::new();
    description.set_placeholder_text(Some("Bot description"));
    let template = gtk::Entry::new();
    let preview = gtk::Label::new(None);
    preview.set_wrap(true);
    preview.set_xalign(0.0);
    preview.add_css_class("dim-label");

    let draft = Rc::new(RefCell::new(ProfileDraft::new()));
    template.set_text(&draft.borrow().template);
    preview.set_label(&draft.borrow().render_prompt());

    for widget in [&name, &description, &template] {
        content.append(widget);
    }
    content.append(&preview);

    {
        let draft = draft.clone();
        let preview = preview.clone();
        name.connect_changed(move |entry| {
            let prompt = draft.borrow_mut().set_name(&entry.text());
            preview.set_label(&prompt);
        });
    }
    {
        let draft = draft.clone();
        let preview = preview.clone();
        description.connect_changed(move |entry| {
            let prompt = draft.borrow_mut().set_description(&entry.text());
            preview.set_label(&prompt);
        });
    }
    {
        let draft = draft.clone();
        let preview = preview.clone();
        template.connect_changed(move |entry| {
            let mut draft = draft.borrow_mut();
            draft.template = entry.text().to_string();
            preview.set_label(&draft.render_prompt());
        });
    }

    dialog.content_area().append(&content);
    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    let ok_btn = dialog.add_button("Create", gtk::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk::ResponseType::Ok);

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            let draft = draft.borrow().clone();
            if !draft.is_complete() {
                return;
            }
            on_create(draft);
        }
        dlg.close();
    });

    dialog.present();
}
