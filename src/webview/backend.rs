use std::any::Any;
use std::sync::Weak;

use crate::app::Application;
use crate::config::Preferences;
use crate::event::Policy;
use crate::scheme::{Request, Responder};
use crate::webview::events::{Icon, LoadState, Navigation, WebEvent};
use crate::webview::WebviewInner;

/// RGBA background color.
pub type Color = [u8; 4];

/// Backend handle of a script registered to run on document creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InjectionToken(pub u64);

/// Everything a backend gets when it is attached to a webview.
pub struct BackendContext {
    pub events: NativeEvents,
    pub preferences: Preferences,
    /// Custom schemes declared before the first webview was created.
    pub schemes: Vec<String>,
}

/// Native rendering surface. All methods are called on the UI thread.
///
/// Methods must not call back into [`NativeEvents`] synchronously; report through it from native
/// callbacks or via [`NativeEvents::defer`].
pub trait WebviewBackend: Send + 'static {
    /// Short identifier of the implementation, e.g. `"webkitgtk"`.
    fn name(&self) -> &'static str;

    fn attach(&mut self, context: BackendContext) -> anyhow::Result<()>;

    /// JavaScript statement that hands the string variable `message` to the native side, which
    /// must then call [`NativeEvents::message`].
    fn post_message_script(&self) -> String;

    fn url(&self) -> anyhow::Result<String>;
    fn page_title(&self) -> anyhow::Result<String>;
    fn favicon(&self) -> anyhow::Result<Icon>;

    fn dev_tools(&self) -> anyhow::Result<bool>;
    fn set_dev_tools(&mut self, enabled: bool) -> anyhow::Result<()>;

    fn context_menu(&self) -> anyhow::Result<bool>;
    fn set_context_menu(&mut self, enabled: bool) -> anyhow::Result<()>;

    fn background(&self) -> anyhow::Result<Color>;
    fn set_background(&mut self, color: Color) -> anyhow::Result<()>;

    fn force_dark_mode(&self) -> anyhow::Result<bool>;
    fn set_force_dark_mode(&mut self, enabled: bool) -> anyhow::Result<()>;

    fn navigate(&mut self, url: &str) -> anyhow::Result<()>;
    fn back(&mut self) -> anyhow::Result<()>;
    fn forward(&mut self) -> anyhow::Result<()>;
    fn reload(&mut self) -> anyhow::Result<()>;

    /// Run `code` in the current document.
    fn execute(&mut self, code: &str) -> anyhow::Result<()>;

    /// Run `source` at the creation of every future document.
    fn inject(&mut self, source: &str) -> anyhow::Result<InjectionToken>;
    fn uninject(&mut self, token: InjectionToken) -> anyhow::Result<()>;

    /// Start routing requests for `name` to [`NativeEvents::scheme_request`].
    fn add_scheme(&mut self, name: &str) -> anyhow::Result<()>;
    fn remove_scheme(&mut self, name: &str) -> anyhow::Result<()>;

    /// Start reporting a lazily wired event. Only called for events where [`WebEvent::lazy`] holds,
    /// once per transition from no listeners to some.
    fn subscribe(&mut self, _event: WebEvent) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop reporting an event previously passed to `subscribe`.
    fn unsubscribe(&mut self, _event: WebEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Inbound side of a webview backend. Callable from any thread; user callbacks always run on the
/// UI thread.
#[derive(Clone)]
pub struct NativeEvents {
    pub(crate) webview: Weak<WebviewInner>,
    pub(crate) app: Application,
}

impl NativeEvents {
    /// A message posted by the page.
    pub fn message(&self, message: String) {
        self.deliver(move |webview| webview.on_message(message));
    }

    /// A request for a custom scheme. Returns `false` when the scheme is not handled, in which case
    /// the backend should fall back to its default behaviour. `responder` is dropped unused then.
    pub fn scheme_request(&self, request: Request, responder: Box<dyn Responder>) -> bool {
        match self.webview.upgrade() {
            Some(webview) => webview.scheme_request(request, responder),
            None => false,
        }
    }

    /// A navigation is about to start. `Policy::Block` means it must be cancelled.
    pub fn navigating(&self, navigation: Navigation) -> Policy {
        self.decide(move |webview| webview.navigating(navigation))
    }

    /// The page asked for a new window. `Policy::Block` means it must not be opened.
    pub fn new_window(&self, url: String) -> Policy {
        let navigation = Navigation {
            new_window: true,
            ..Navigation::new(url)
        };
        self.decide(move |webview| webview.new_window(navigation))
    }

    pub fn dom_content_loaded(&self) {
        let webview = self.webview.clone();
        let ready = move || {
            if let Some(webview) = webview.upgrade() {
                webview.dom_content_loaded();
            }
        };

        if self.app.thread_safe() {
            ready();
        } else {
            self.app.post(ready);
        }
    }

    pub fn navigated(&self, url: String) {
        self.deliver(move |webview| webview.events.navigated.fire(&url));
    }

    pub fn title_changed(&self, title: String) {
        self.deliver(move |webview| webview.events.title.fire(&title));
    }

    pub fn favicon_changed(&self, icon: Icon) {
        self.deliver(move |webview| webview.events.favicon.fire(&icon));
    }

    pub fn load_finished(&self) {
        self.deliver(move |webview| webview.events.load.fire(&LoadState::Finished));
    }

    /// Run `f` on the UI thread later, outside of any backend call.
    pub fn defer(&self, f: impl FnOnce() + Send + 'static) {
        self.app.post(f);
    }

    fn deliver(&self, f: impl FnOnce(&std::sync::Arc<WebviewInner>) + Send + 'static) {
        let webview = self.webview.clone();
        self.app.post(move || {
            if let Some(webview) = webview.upgrade() {
                f(&webview);
            }
        });
    }

    fn decide(&self, f: impl FnOnce(&std::sync::Arc<WebviewInner>) -> Policy + Send + 'static) -> Policy {
        let webview = self.webview.clone();
        let run = move || webview.upgrade().map(|w| f(&w)).unwrap_or_default();

        self.app.dispatch(run).unwrap_or_else(|e| {
            log::warn!("navigation decision could not reach the UI thread: {e}");
            Policy::Allow
        })
    }
}
