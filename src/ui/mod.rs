pub mod chat_view;
pub mod controller;
pub mod login;
pub mod main_window;
pub mod new_bot;
pub mod sidebar;

use gtk4 as gtk;

use crate::clipboard::Clipboard;
use crate::error::Result;

pub struct DisplayClipboard(pub gtk::gdk::Clipboard);

impl Clipboard for DisplayClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        self.0.set_text(text);
        Ok(())
    }
}

/// Attaches a one-shot handler for a result produced by
/// [`crate::utils::run_async_to_main`].
#[allow(deprecated)]
pub fn on_main<T: Send + 'static>(
    rx: glib::Receiver<Result<T>>,
    handler: impl FnOnce(Result<T>) + 'static,
) {
    let mut handler = Some(handler);
    rx.attach(None, move |res| {
        if let Some(handler) = handler.take() {
            handler(res);
        }
        glib::ControlFlow::Break
    });
}
