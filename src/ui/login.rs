use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;

use crate::api::client::ApiClient;
use crate::app::AppState;
use crate::error::ClientError;
use crate::ui::on_main;

pub fn show_login_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("BotChat Login")
        .default_width(420)
        .default_height(320)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Sign in to BotChat"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let saved = AppState::load();

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Server URL (e.g. http://localhost:5000)"));
    server_entry.set_text(&saved.base_url);
    server_entry.set_hexpand(true);

    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Email"));
    email_entry.set_text(&saved.email);
    email_entry.set_hexpand(true);

    // The password toggle comes with PasswordEntry
    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_show_peek_icon(true);
    pass_entry.set_hexpand(true);

    // Only shown once the user asks to create an account
    let confirm_entry = gtk::PasswordEntry::new();
    confirm_entry.set_placeholder_text(Some("Confirm password"));
    confirm_entry.set_show_peek_icon(true);
    confirm_entry.set_hexpand(true);
    confirm_entry.set_visible(false);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&email_entry);
    form.append(&pass_entry);
    form.append(&confirm_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let signup_btn = gtk::Button::with_label("Create account");
    signup_btn.add_css_class("flat");
    let login_btn = gtk::Button::with_label("Sign in");
    login_btn.add_css_class("suggested-action");
    let buttons = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    buttons.set_halign(gtk::Align::End);
    buttons.append(&signup_btn);
    buttons.append(&login_btn);
    root.append(&buttons);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("BotChat"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let server_entry = server_entry.clone();
        let email_entry = email_entry.clone();
        let pass_entry = pass_entry.clone();
        let confirm_entry = confirm_entry.clone();
        let login_btn = login_btn.clone();
        let signup_btn = signup_btn.clone();
        move |signup: bool| {
            if signup && !confirm_entry.is_visible() {
                confirm_entry.set_visible(true);
                confirm_entry.grab_focus();
                status.set_label("Repeat the password to create the account");
                return;
            }
            let url = crate::utils::normalize_url(&server_entry.text());
            let email = email_entry.text().trim().to_string();
            let password = pass_entry.text().to_string();
            if server_entry.text().trim().is_empty() || email.is_empty() || password.is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter server URL, email and password."));
                return;
            }

            let mut state = AppState::load();
            state.base_url = url;
            state.email = email;
            state.password = password;

            let client = match ApiClient::from_state(&state) {
                Ok(client) => client,
                Err(err) => {
                    overlay.add_toast(adw::Toast::new(&format!("{err}")));
                    return;
                }
            };

            status.set_label(if signup { "Creating account…" } else { "Signing in…" });
            login_btn.set_sensitive(false);
            signup_btn.set_sensitive(false);

            let (email, password) = (state.email.clone(), state.password.clone());
            let confirm = signup.then(|| confirm_entry.text().to_string());
            let rx = crate::utils::run_async_to_main(async move {
                if let Some(confirm) = confirm {
                    if let Err(e) = client.signup(&email, &password, &confirm).await {
                        return Err(e);
                    }
                }
                client.login(&email, &password).await
            });

            let app = app.clone();
            let window = window.clone();
            let overlay = overlay.clone();
            let status = status.clone();
            let login_btn = login_btn.clone();
            let signup_btn = signup_btn.clone();
            on_main(rx, move |res| {
                login_btn.set_sensitive(true);
                signup_btn.set_sensitive(true);
                match res {
                    Ok(()) => {
                        status.set_label("Signed in");
                        if let Err(e) = state.save() {
                            overlay.add_toast(adw::Toast::new(&format!("Failed to save settings: {e}")));
                        }
                        crate::ui::main_window::show_main_window(&app);
                        window.close();
                    }
                    Err(ClientError::Login(reason)) if signup => {
                        log::warn!("signup refused: {reason}");
                        status.set_label(&reason);
                    }
                    Err(err) => {
                        log::warn!("login failed: {err}");
                        status.set_label("Sign in failed");
                        overlay.add_toast(adw::Toast::new("Could not sign in. Check URL, email and password."));
                    }
                }
            });
        }
    };

    use std::rc::Rc;
    let on_connect: Rc<dyn Fn(bool)> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)(false));
    }
    {
        let on_connect = on_connect.clone();
        signup_btn.connect_clicked(move |_| (on_connect)(true));
    }
    // Enter in any field signs in
    {
        let on_connect = on_connect.clone();
        server_entry.connect_activate(move |_| (on_connect)(false));
    }
    {
        let on_connect = on_connect.clone();
        email_entry.connect_activate(move |_| (on_connect)(false));
    }
    {
        let on_connect = on_connect.clone();
        pass_entry.connect_activate(move |_| (on_connect)(false));
    }

    window.present();
}
