//! Backend implementations shipped with the crate.
//!
//! Platform backends live in their own crates and implement
//! [`WindowBackend`](crate::window::WindowBackend) and
//! [`WebviewBackend`](crate::webview::WebviewBackend).

pub mod headless;
