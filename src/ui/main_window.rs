use adw::prelude::*;
use adw::Application;
use std::rc::Rc;

use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::ui::controller::Controller;

pub fn show_main_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("BotChat")
        .default_width(960)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some("BotChat"));
    header.set_title_widget(Some(&title));

    let new_bot_btn = gtk4::Button::with_label("New Bot");
    new_bot_btn.add_css_class("suggested-action");
    header.pack_end(&new_bot_btn);
    let logout_btn = gtk4::Button::with_label("Log out");
    header.pack_start(&logout_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));

    let state = AppState::load();
    let client = match ApiClient::from_state(&state) {
        Ok(client) => client,
        Err(err) => {
            log::warn!("invalid server settings: {err}");
            window.close();
            crate::ui::login::show_login_window(app);
            return;
        }
    };

    let controller: Rc<Controller> = Controller::new(state, client, overlay.clone());
    split.set_flap(Some(&controller.sidebar.widget()));
    split.set_content(Some(&controller.chat.widget()));
    overlay.set_child(Some(&split));
    window.present();
    controller.start();

    {
        let controller = controller.clone();
        let window = window.clone();
        let app = app.clone();
        logout_btn.connect_clicked(move |btn| {
            btn.set_sensitive(false);
            let window = window.clone();
            let app = app.clone();
            controller.logout(move || {
                crate::ui::login::show_login_window(&app);
                window.close();
            });
        });
    }

    {
        let controller = controller.clone();
        let window = window.clone();
        new_bot_btn.connect_clicked(move |_| {
            let controller = controller.clone();
            crate::ui::new_bot::show_new_bot_dialog(&window, move |draft| {
                controller.create_bot(draft);
            });
        });
    }
}
