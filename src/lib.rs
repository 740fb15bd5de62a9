//! Native client for the bot-chat web backend.
//!
//! The headless core ([`session`], [`render`], [`contacts`], [`feedback`],
//! [`profile`]) holds all chat state and can be driven without a display.
//! [`api::client::ApiClient`] talks to the backend. The GTK front end lives
//! in `ui` behind the `gui` feature.

pub mod api;
pub mod app;
pub mod clipboard;
pub mod contacts;
pub mod error;
pub mod feedback;
pub mod profile;
pub mod render;
pub mod session;
pub mod storage;
pub mod utils;

#[cfg(feature = "gui")]
pub mod ui;

pub use error::{ClientError, Result};
