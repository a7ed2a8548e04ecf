//! Views onto the native objects behind a window or webview.
//!
//! [`Natives`] is the stable descriptor: plain `raw-window-handle` values plus the names of the
//! backends that produced them. It is what modules receive on construction.
//!
//! The unstable view (`Window::native_unstable` / `Webview::native_unstable`, behind the `unstable`
//! feature) hands out a pointer to the concrete backend object itself. It carries no guarantee
//! across backend versions and is only valid while the owner is alive.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Layout version of [`Natives`]. Bumped when fields change meaning.
pub const NATIVES_VERSION: u32 = 1;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Natives {
    pub version: u32,
    /// Name of the window backend.
    pub window_backend: &'static str,
    /// Name of the webview backend, if the descriptor was taken from a webview.
    pub webview_backend: Option<&'static str>,
    pub window: Option<RawWindowHandle>,
    pub display: Option<RawDisplayHandle>,
}

// SAFETY: the handles are opaque identifiers. Nothing here dereferences them, and using them in
// any meaningful way is already unsafe and bound to the UI thread by the platform.
unsafe impl Send for Natives {}
unsafe impl Sync for Natives {}

impl Natives {
    pub(crate) fn window(
        backend: &'static str,
        window: Option<RawWindowHandle>,
        display: Option<RawDisplayHandle>,
    ) -> Self {
        Self {
            version: NATIVES_VERSION,
            window_backend: backend,
            webview_backend: None,
            window,
            display,
        }
    }

    pub(crate) fn with_webview(mut self, backend: &'static str) -> Self {
        self.webview_backend = Some(backend);
        self
    }

    /// Whether both a window and a display handle are available.
    pub fn is_complete(&self) -> bool {
        self.window.is_some() && self.display.is_some()
    }
}
