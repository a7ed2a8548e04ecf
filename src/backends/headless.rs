//! In-memory backends without any native UI.
//!
//! [`HeadlessWindow`] and [`HeadlessWebview`] keep their state in memory and play through a page
//! lifecycle (navigation, DOM ready, load) whenever they navigate. Each comes with a handle that
//! simulates what a user or a page would do: closing the window, posting messages, requesting
//! custom scheme URLs.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, WebDisplayHandle, WebWindowHandle};

use crate::config::Preferences;
use crate::event::Policy;
use crate::scheme::{scheme_of, Response, SchemeError};
use crate::sync::lock;
use crate::webview::{
    BackendContext, Color, Icon, InjectionToken, NativeEvents, Navigation, WebEvent, WebviewBackend,
};
use crate::window::{NativeWindowEvents, Size, WindowBackend};

const NAME: &str = "headless";

// ---------- Window ----------

#[derive(Default)]
struct WindowState {
    events: Option<NativeWindowEvents>,
    title: String,
    visible: bool,
    size: Size,
    destroyed: bool,
}

/// Window backend that only remembers what it was told.
pub struct HeadlessWindow {
    state: Arc<Mutex<WindowState>>,
}

/// Plays the user of a [`HeadlessWindow`].
#[derive(Clone)]
pub struct HeadlessWindowHandle {
    state: Arc<Mutex<WindowState>>,
}

impl HeadlessWindow {
    pub fn new() -> (Self, HeadlessWindowHandle) {
        let state = Arc::new(Mutex::new(WindowState::default()));
        (Self { state: state.clone() }, HeadlessWindowHandle { state })
    }
}

impl WindowBackend for HeadlessWindow {
    fn name(&self) -> &'static str {
        NAME
    }

    fn attach(&mut self, events: NativeWindowEvents) -> Result<()> {
        lock(&self.state).events = Some(events);
        Ok(())
    }

    fn title(&self) -> Result<String> {
        Ok(lock(&self.state).title.clone())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        lock(&self.state).title = title.to_string();
        Ok(())
    }

    fn visible(&self) -> Result<bool> {
        Ok(lock(&self.state).visible)
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        lock(&self.state).visible = visible;
        Ok(())
    }

    fn size(&self) -> Result<Size> {
        Ok(lock(&self.state).size)
    }

    fn set_size(&mut self, size: Size) -> Result<()> {
        lock(&self.state).size = size;
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        let events = lock(&self.state).events.clone();
        if let Some(events) = events {
            events.focused(true);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.destroyed {
            return Err(anyhow!("window is already destroyed"));
        }
        state.destroyed = true;
        state.visible = false;
        Ok(())
    }

    fn window_handle(&self) -> Option<RawWindowHandle> {
        Some(RawWindowHandle::Web(WebWindowHandle::new(1)))
    }

    fn display_handle(&self) -> Option<RawDisplayHandle> {
        Some(RawDisplayHandle::Web(WebDisplayHandle::new()))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl HeadlessWindowHandle {
    pub fn title(&self) -> String {
        lock(&self.state).title.clone()
    }

    pub fn destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Click the close button. The window is destroyed unless a listener vetoes.
    pub fn request_close(&self) -> Policy {
        let Some(events) = lock(&self.state).events.clone() else {
            return Policy::Allow;
        };

        let policy = events.close_requested();
        if policy == Policy::Allow {
            let mut state = lock(&self.state);
            state.destroyed = true;
            state.visible = false;
        }
        policy
    }

    /// Drag the window border.
    pub fn resize(&self, size: Size) {
        let events = {
            let mut state = lock(&self.state);
            state.size = size;
            state.events.clone()
        };

        if let Some(events) = events {
            events.resized(size);
        }
    }

    pub fn focus(&self, focused: bool) {
        let events = lock(&self.state).events.clone();
        if let Some(events) = events {
            events.focused(focused);
        }
    }
}

// ---------- Webview ----------

/// How a navigation moves through the history.
#[derive(Debug, Copy, Clone)]
enum Step {
    Push,
    Goto(usize),
    Reload,
}

struct PageState {
    events: Option<NativeEvents>,
    preferences: Option<Preferences>,
    declared: Vec<String>,

    url: String,
    history: Vec<String>,
    cursor: Option<usize>,
    title: String,
    favicon: Icon,
    favicon_broken: bool,

    dev_tools: bool,
    context_menu: bool,
    background: Color,
    force_dark_mode: bool,

    executed: Vec<String>,
    injected: BTreeMap<u64, String>,
    /// Injections whose source contains one of these refuse to be removed
    pinned: Vec<String>,
    next_token: u64,
    schemes: BTreeSet<String>,
    subscribed: BTreeSet<WebEvent>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            events: None,
            preferences: None,
            declared: Vec::new(),
            url: String::new(),
            history: Vec::new(),
            cursor: None,
            title: String::new(),
            favicon: Icon::default(),
            favicon_broken: false,
            dev_tools: false,
            context_menu: true,
            background: [255, 255, 255, 255],
            force_dark_mode: false,
            executed: Vec::new(),
            injected: BTreeMap::new(),
            pinned: Vec::new(),
            next_token: 0,
            schemes: BTreeSet::new(),
            subscribed: BTreeSet::new(),
        }
    }
}

/// Webview backend that records scripts instead of running them.
pub struct HeadlessWebview {
    page: HeadlessPage,
}

/// Plays the page shown by a [`HeadlessWebview`].
#[derive(Clone)]
pub struct HeadlessPage {
    state: Arc<Mutex<PageState>>,
}

/// Answer to a request made through [`HeadlessPage::request`].
#[derive(Clone, Default)]
pub struct PendingResponse {
    slot: Arc<Mutex<Option<std::result::Result<Response, SchemeError>>>>,
}

impl PendingResponse {
    pub fn ready(&self) -> bool {
        lock(&self.slot).is_some()
    }

    pub fn take(&self) -> Option<std::result::Result<Response, SchemeError>> {
        lock(&self.slot).take()
    }
}

impl HeadlessWebview {
    pub fn new() -> (Self, HeadlessPage) {
        let page = HeadlessPage {
            state: Arc::new(Mutex::new(PageState::default())),
        };
        (Self { page: page.clone() }, page)
    }
}

impl WebviewBackend for HeadlessWebview {
    fn name(&self) -> &'static str {
        NAME
    }

    fn attach(&mut self, context: BackendContext) -> Result<()> {
        let mut state = lock(&self.page.state);
        state.events = Some(context.events);
        state.preferences = Some(context.preferences);
        state.declared = context.schemes;
        Ok(())
    }

    fn post_message_script(&self) -> String {
        HeadlessPage::POST_MESSAGE.to_string()
    }

    fn url(&self) -> Result<String> {
        Ok(lock(&self.page.state).url.clone())
    }

    fn page_title(&self) -> Result<String> {
        Ok(lock(&self.page.state).title.clone())
    }

    fn favicon(&self) -> Result<Icon> {
        let state = lock(&self.page.state);
        if state.favicon_broken {
            return Err(anyhow!("favicon could not be decoded"));
        }
        Ok(state.favicon.clone())
    }

    fn dev_tools(&self) -> Result<bool> {
        Ok(lock(&self.page.state).dev_tools)
    }

    fn set_dev_tools(&mut self, enabled: bool) -> Result<()> {
        lock(&self.page.state).dev_tools = enabled;
        Ok(())
    }

    fn context_menu(&self) -> Result<bool> {
        Ok(lock(&self.page.state).context_menu)
    }

    fn set_context_menu(&mut self, enabled: bool) -> Result<()> {
        lock(&self.page.state).context_menu = enabled;
        Ok(())
    }

    fn background(&self) -> Result<Color> {
        Ok(lock(&self.page.state).background)
    }

    fn set_background(&mut self, color: Color) -> Result<()> {
        lock(&self.page.state).background = color;
        Ok(())
    }

    fn force_dark_mode(&self) -> Result<bool> {
        Ok(lock(&self.page.state).force_dark_mode)
    }

    fn set_force_dark_mode(&mut self, enabled: bool) -> Result<()> {
        lock(&self.page.state).force_dark_mode = enabled;
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        self.page.start(url.to_string(), Step::Push)
    }

    fn back(&mut self) -> Result<()> {
        let target = {
            let state = lock(&self.page.state);
            state
                .cursor
                .filter(|c| *c > 0)
                .map(|c| (c - 1, state.history[c - 1].clone()))
        };

        match target {
            Some((index, url)) => self.page.start(url, Step::Goto(index)),
            None => Ok(()),
        }
    }

    fn forward(&mut self) -> Result<()> {
        let target = {
            let state = lock(&self.page.state);
            state
                .cursor
                .map(|c| c + 1)
                .filter(|c| *c < state.history.len())
                .map(|c| (c, state.history[c].clone()))
        };

        match target {
            Some((index, url)) => self.page.start(url, Step::Goto(index)),
            None => Ok(()),
        }
    }

    fn reload(&mut self) -> Result<()> {
        let url = lock(&self.page.state).url.clone();
        if url.is_empty() {
            return Ok(());
        }
        self.page.start(url, Step::Reload)
    }

    fn execute(&mut self, code: &str) -> Result<()> {
        lock(&self.page.state).executed.push(code.to_string());
        Ok(())
    }

    fn inject(&mut self, source: &str) -> Result<InjectionToken> {
        let mut state = lock(&self.page.state);
        state.next_token += 1;
        let token = state.next_token;
        state.injected.insert(token, source.to_string());
        Ok(InjectionToken(token))
    }

    fn uninject(&mut self, token: InjectionToken) -> Result<()> {
        let mut state = lock(&self.page.state);
        let source = state
            .injected
            .get(&token.0)
            .ok_or_else(|| anyhow!("unknown injection {token:?}"))?;

        if state.pinned.iter().any(|needle| source.contains(needle.as_str())) {
            return Err(anyhow!("injection {token:?} is pinned"));
        }

        state.injected.remove(&token.0);
        Ok(())
    }

    fn add_scheme(&mut self, name: &str) -> Result<()> {
        lock(&self.page.state).schemes.insert(name.to_string());
        Ok(())
    }

    fn remove_scheme(&mut self, name: &str) -> Result<()> {
        lock(&self.page.state).schemes.remove(name);
        Ok(())
    }

    fn subscribe(&mut self, event: WebEvent) -> Result<()> {
        lock(&self.page.state).subscribed.insert(event);
        Ok(())
    }

    fn unsubscribe(&mut self, event: WebEvent) -> Result<()> {
        lock(&self.page.state).subscribed.remove(&event);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl HeadlessPage {
    /// Statement the bootstrap uses to hand a message to the native side.
    pub const POST_MESSAGE: &'static str = "window.headless.postMessage(message);";

    fn events(&self) -> Option<NativeEvents> {
        lock(&self.state).events.clone()
    }

    /// Queue a page load. It plays through once the loop runs, outside of the backend call.
    fn start(&self, url: String, step: Step) -> Result<()> {
        let events = self.events().ok_or_else(|| anyhow!("webview is not attached"))?;
        let page = self.clone();
        events.defer(move || page.load(url, step));
        Ok(())
    }

    fn load(&self, url: String, step: Step) {
        let Some(events) = self.events() else {
            return;
        };

        if events.navigating(Navigation::new(url.clone())) == Policy::Block {
            return;
        }

        {
            let mut state = lock(&self.state);
            match step {
                Step::Push => {
                    let keep = state.cursor.map_or(0, |c| c + 1);
                    state.history.truncate(keep);
                    state.history.push(url.clone());
                    state.cursor = Some(state.history.len() - 1);
                }
                Step::Goto(index) => state.cursor = Some(index),
                Step::Reload => {}
            }
            state.url = url.clone();
            state.title.clear();
        }

        if self.subscribed(WebEvent::Navigated) {
            events.navigated(url);
        }
        events.dom_content_loaded();
        if self.subscribed(WebEvent::Load) {
            events.load_finished();
        }
    }

    pub fn post_message_script(&self) -> String {
        Self::POST_MESSAGE.to_string()
    }

    /// Committed history entries, oldest first.
    pub fn history(&self) -> Vec<String> {
        lock(&self.state).history.clone()
    }

    /// Scripts executed in the page, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state).executed.clone()
    }

    pub fn take_executed(&self) -> Vec<String> {
        std::mem::take(&mut lock(&self.state).executed)
    }

    /// Sources of the scripts currently injected, in injection order.
    pub fn injected(&self) -> Vec<String> {
        lock(&self.state).injected.values().cloned().collect()
    }

    /// Schemes currently routed to the webview.
    pub fn schemes(&self) -> Vec<String> {
        lock(&self.state).schemes.iter().cloned().collect()
    }

    /// Schemes declared when the backend was attached.
    pub fn declared_schemes(&self) -> Vec<String> {
        lock(&self.state).declared.clone()
    }

    pub fn subscribed(&self, event: WebEvent) -> bool {
        lock(&self.state).subscribed.contains(&event)
    }

    pub fn preferences(&self) -> Option<Preferences> {
        lock(&self.state).preferences.clone()
    }

    /// Deliver `message` as if the page posted it.
    pub fn post_message(&self, message: impl Into<String>) {
        if let Some(events) = self.events() {
            events.message(message.into());
        }
    }

    /// Request `uri` from the page. `None` means the webview does not handle the scheme.
    pub fn request(&self, uri: &str) -> Option<PendingResponse> {
        scheme_of(uri)?;
        let events = self.events()?;
        let request = http::Request::get(uri).body(Vec::new()).ok()?;

        let pending = PendingResponse::default();
        let slot = pending.slot.clone();
        let responder = move |result: std::result::Result<Response, SchemeError>| {
            *lock(&slot) = Some(result);
        };

        events.scheme_request(request, Box::new(responder)).then_some(pending)
    }

    /// Let the page change its title.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        lock(&self.state).title = title.clone();

        if let (Some(events), true) = (self.events(), self.subscribed(WebEvent::Title)) {
            events.title_changed(title);
        }
    }

    pub fn set_favicon(&self, icon: Icon) {
        {
            let mut state = lock(&self.state);
            state.favicon = icon.clone();
            state.favicon_broken = false;
        }

        if let Some(events) = self.events() {
            events.favicon_changed(icon);
        }
    }

    /// Make removing any injection whose source contains `needle` fail.
    pub fn pin_injection(&self, needle: impl Into<String>) {
        lock(&self.state).pinned.push(needle.into());
    }

    /// Make every following favicon read fail.
    pub fn break_favicon(&self) {
        lock(&self.state).favicon_broken = true;
    }

    /// Let the page open a new window, e.g. through `window.open`.
    pub fn open_window(&self, url: impl Into<String>) -> Policy {
        match self.events() {
            Some(events) => events.new_window(url.into()),
            None => Policy::Allow,
        }
    }
}
