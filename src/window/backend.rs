use std::any::Any;
use std::sync::Weak;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::app::Application;
use crate::event::Policy;
use crate::window::{Size, WindowInner};

/// Native window implementation. All methods are called on the UI thread.
pub trait WindowBackend: Send + 'static {
    /// Short identifier of the implementation, e.g. `"gtk4"`.
    fn name(&self) -> &'static str;

    /// Called once when the window is created. `events` is how the backend reports what the user
    /// does to the window.
    fn attach(&mut self, events: NativeWindowEvents) -> anyhow::Result<()>;

    fn title(&self) -> anyhow::Result<String>;
    fn set_title(&mut self, title: &str) -> anyhow::Result<()>;

    fn visible(&self) -> anyhow::Result<bool>;
    fn set_visible(&mut self, visible: bool) -> anyhow::Result<()>;

    fn size(&self) -> anyhow::Result<Size>;
    fn set_size(&mut self, size: Size) -> anyhow::Result<()>;

    fn focus(&mut self) -> anyhow::Result<()>;

    /// Destroy the native window. Only called after the close request was not vetoed.
    fn close(&mut self) -> anyhow::Result<()>;

    fn window_handle(&self) -> Option<RawWindowHandle> {
        None
    }

    fn display_handle(&self) -> Option<RawDisplayHandle> {
        None
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Inbound side of a window backend. Callable from any thread; user callbacks always run on the
/// UI thread.
#[derive(Clone)]
pub struct NativeWindowEvents {
    pub(crate) window: Weak<WindowInner>,
    pub(crate) app: Application,
}

impl NativeWindowEvents {
    /// The user asked to close the window. Returns `Policy::Block` if a listener vetoed it, in
    /// which case the backend must keep the window open.
    pub fn close_requested(&self) -> Policy {
        let window = self.window.clone();
        let decide = move || match window.upgrade() {
            Some(window) => window.close_requested(),
            None => Policy::Allow,
        };

        self.app.dispatch(decide).unwrap_or_else(|e| {
            log::warn!("close request could not reach the UI thread: {e}");
            Policy::Allow
        })
    }

    pub fn resized(&self, size: Size) {
        self.deliver(move |window| window.events.resize.fire(&size));
    }

    pub fn focused(&self, focused: bool) {
        self.deliver(move |window| window.events.focus.fire(&focused));
    }

    fn deliver(&self, f: impl FnOnce(&WindowInner) + Send + 'static) {
        let window = self.window.clone();
        self.app.post(move || {
            if let Some(window) = window.upgrade() {
                f(&window);
            }
        });
    }
}
