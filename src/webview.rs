//! Embedded web content.
//!
//! A [`Webview`] lives inside a [`Window`] and drives a [`WebviewBackend`]. Like the window it is
//! a thread-safe handle: operations that touch the backend are carried out on the UI thread, and
//! listeners are always invoked there.
//!
//! On top of the backend it provides the script bridge (exposed functions, evaluations), custom
//! scheme routing, an embedded file server under `saucer://embedded/`, script injection with
//! DOM-ready deferral and extension modules.

mod backend;
mod embed;
pub mod events;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

use crate::app::{Application, Launch};
use crate::config::Preferences;
use crate::errors::WebviewError;
use crate::event::{EventId, EventKind, Policy};
use crate::module::{self, Module, Modules};
use crate::natives::Natives;
use crate::rpc::{self, Arguments, Call, Evaluation, Exposed, Function, Inbound, Rpc};
use crate::scheme::{self, Executor, Request, Resolver, Responder, BUILTIN_SCHEME};
use crate::script::{self, LoadTime, Script, ScriptId};
use crate::sync::{lock, write};
use crate::window::Window;

pub use backend::{BackendContext, Color, InjectionToken, NativeEvents, WebviewBackend};
pub use embed::EmbeddedFile;
pub use events::{Icon, LoadState, Navigation, WebEvent, WebEvents};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WebviewId(Uuid);

impl WebviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WebviewId {
    fn default() -> Self {
        Self::new()
    }
}

struct Injected {
    id: ScriptId,
    script: Script,
    /// Set for creation-time scripts, which live in the backend
    token: Option<InjectionToken>,
}

#[derive(Default)]
struct State {
    dom_loaded: bool,
    /// Code executed before the DOM was ready
    pending: Vec<String>,
    scripts: Vec<Injected>,
    next_script: u64,
    schemes: HashMap<String, (Resolver, Launch)>,
}

pub(crate) struct WebviewInner {
    id: WebviewId,
    app: Application,
    window: Window,
    pub(crate) events: WebEvents,
    backend: Mutex<Box<dyn WebviewBackend>>,
    state: Mutex<State>,
    embedded: embed::EmbeddedFiles,
    modules: Mutex<Modules>,
    rpc: Mutex<Rpc>,
}

impl WebviewInner {
    fn query<T: Default>(&self, what: &str, f: impl FnOnce(&dyn WebviewBackend) -> anyhow::Result<T>) -> T {
        let backend = lock(&self.backend);
        f(&**backend).unwrap_or_else(|e| {
            log::warn!("webview {}: reading {what} failed: {e:#}", backend.name());
            T::default()
        })
    }

    fn apply(&self, f: impl FnOnce(&mut dyn WebviewBackend) -> anyhow::Result<()>) -> Result<(), WebviewError> {
        let mut backend = lock(&self.backend);
        f(&mut **backend).map_err(WebviewError::Backend)
    }

    /// Run `f` on the UI thread: right away if already there, queued otherwise.
    fn on_ui_thread(self: &Arc<Self>, f: impl FnOnce(&Arc<WebviewInner>) + Send + 'static) {
        if self.app.thread_safe() {
            f(self);
            return;
        }

        let weak = Arc::downgrade(self);
        self.app.post(move || {
            if let Some(inner) = weak.upgrade() {
                f(&inner);
            }
        });
    }

    fn execute(&self, code: String) -> Result<(), WebviewError> {
        {
            let mut state = lock(&self.state);
            if !state.dom_loaded {
                state.pending.push(code);
                return Ok(());
            }
        }

        self.apply(|b| b.execute(&code))
    }

    fn inject(&self, script: Script) -> Result<ScriptId, WebviewError> {
        let token = match script.time {
            LoadTime::Creation => {
                let source = script.source();
                Some(lock(&self.backend).inject(&source)?)
            }
            LoadTime::Ready => None,
        };

        let mut state = lock(&self.state);
        state.next_script += 1;
        let id = ScriptId(state.next_script);
        state.scripts.push(Injected { id, script, token });

        Ok(id)
    }

    fn remove_script(&self, id: ScriptId) -> Result<bool, WebviewError> {
        let found = lock(&self.state).scripts.iter().find(|s| s.id == id).map(|s| s.token);
        let Some(token) = found else {
            return Ok(false);
        };

        // The entry stays if the backend keeps the script
        if let Some(token) = token {
            self.apply(|b| b.uninject(token))?;
        }

        lock(&self.state).scripts.retain(|s| s.id != id);
        Ok(true)
    }

    fn clear_scripts(&self) -> Result<(), WebviewError> {
        let removable: Vec<(ScriptId, Option<InjectionToken>)> = lock(&self.state)
            .scripts
            .iter()
            .filter(|s| !s.script.permanent)
            .map(|s| (s.id, s.token))
            .collect();

        let mut removed = Vec::with_capacity(removable.len());
        let mut first_error = None;

        {
            let mut backend = lock(&self.backend);
            for (id, token) in removable {
                match token.map(|token| backend.uninject(token)) {
                    Some(Err(e)) => {
                        log::warn!("webview {}: removing {id} failed: {e:#}", backend.name());
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    _ => removed.push(id),
                }
            }
        }

        lock(&self.state).scripts.retain(|s| !removed.contains(&s.id));

        match first_error {
            Some(e) => Err(WebviewError::Backend(e)),
            None => Ok(()),
        }
    }

    fn handle_scheme(&self, name: String, resolver: Resolver, policy: Launch) -> Result<bool, WebviewError> {
        if !scheme::valid_name(&name) {
            log::warn!("refusing to handle invalid scheme name {name:?}");
            return Ok(false);
        }

        if lock(&self.state).schemes.contains_key(&name) {
            log::warn!("scheme {name:?} is already handled, keeping the first resolver");
            return Ok(false);
        }

        if !scheme::registered(&name) {
            log::warn!("scheme {name:?} was not registered before the first webview, some backends will not route it");
        }

        self.apply(|b| b.add_scheme(&name))?;
        lock(&self.state).schemes.insert(name, (resolver, policy));
        Ok(true)
    }

    fn remove_scheme(&self, name: &str) -> Result<bool, WebviewError> {
        if lock(&self.state).schemes.remove(name).is_none() {
            return Ok(false);
        }

        self.apply(|b| b.remove_scheme(name))?;
        Ok(true)
    }

    fn natives(&self) -> Natives {
        let backend = lock(&self.backend).name();
        self.window.inner().natives().with_webview(backend)
    }

    /// Install the native subscription for a lazily wired event that gained listeners.
    fn wire(self: &Arc<Self>, event: WebEvent) {
        if self.events.wired(event) || self.events.is_empty(event) {
            return;
        }

        if let Err(e) = lock(&self.backend).subscribe(event) {
            log::warn!("subscribing to {event:?} failed: {e:#}");
            return;
        }

        let weak = Arc::downgrade(self);
        self.events.on_clear(event, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            inner.on_ui_thread(move |inner| {
                // A listener added in the meantime may have wired the event again
                if !inner.events.is_empty(event) || inner.events.wired(event) {
                    return;
                }

                if let Err(e) = lock(&inner.backend).unsubscribe(event) {
                    log::warn!("unsubscribing from {event:?} failed: {e:#}");
                }
            });
        });
    }

    // ---------- Native events ----------

    pub(crate) fn scheme_request(&self, request: Request, responder: Box<dyn Responder>) -> bool {
        let Some(name) = request.uri().scheme_str().map(str::to_string) else {
            log::debug!("ignoring scheme request without a scheme: {}", request.uri());
            return false;
        };

        let handler = lock(&self.state).schemes.get(&name).cloned();
        let Some((resolver, policy)) = handler else {
            return false;
        };

        scheme::launch(&self.app, resolver, policy, request, responder);
        true
    }

    pub(crate) fn navigating(self: &Arc<Self>, navigation: Navigation) -> Policy {
        if self.events.navigate.until(Policy::Block, &navigation) {
            log::debug!("navigation to {} was blocked", navigation.url);
            return Policy::Block;
        }

        lock(&self.state).dom_loaded = false;

        let weak = Arc::downgrade(self);
        self.app.post(move || {
            if let Some(inner) = weak.upgrade() {
                inner.events.load.fire(&LoadState::Started);
            }
        });

        Policy::Allow
    }

    pub(crate) fn new_window(&self, navigation: Navigation) -> Policy {
        if self.events.navigate.until(Policy::Block, &navigation) {
            Policy::Block
        } else {
            Policy::Allow
        }
    }

    pub(crate) fn dom_content_loaded(self: &Arc<Self>) {
        let (ready, pending) = {
            let mut state = lock(&self.state);
            state.dom_loaded = true;

            let ready: Vec<String> = state
                .scripts
                .iter()
                .filter(|s| s.script.time == LoadTime::Ready)
                .map(|s| s.script.source())
                .collect();

            (ready, std::mem::take(&mut state.pending))
        };

        {
            let mut backend = lock(&self.backend);
            for code in ready.iter().chain(pending.iter()) {
                if let Err(e) = backend.execute(code) {
                    log::warn!("executing script on DOM ready failed: {e:#}");
                }
            }
        }

        let weak = Arc::downgrade(self);
        self.app.post(move || {
            if let Some(inner) = weak.upgrade() {
                inner.events.dom_ready.fire(&());
            }
        });
    }

    pub(crate) fn on_message(self: &Arc<Self>, message: String) {
        let modules = lock(&self.modules).snapshot();
        if module::intercept(&modules, &message) {
            return;
        }

        match rpc::decode(&message) {
            Some(Inbound::Call(call)) => self.call(call),
            Some(Inbound::Resolve(resolve)) => {
                let id = resolve.id;
                lock(&self.rpc).settle(id, resolve.outcome());
            }
            None => log::debug!("ignoring message that is not part of the bridge protocol"),
        }
    }

    fn call(self: &Arc<Self>, call: Call) {
        let Some(exposed) = lock(&self.rpc).function(&call.name) else {
            log::debug!("script called unknown function {:?}", call.name);
            return;
        };

        let Call { id, params, .. } = call;

        match exposed.launch {
            Launch::Sync => {
                let outcome = exposed.call(params);
                self.reply(id, outcome);
            }
            Launch::Async => {
                let weak = Arc::downgrade(self);
                let app = self.app.clone();

                self.app.pool().emplace(move || {
                    let outcome = exposed.call(params);
                    app.post(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.reply(id, outcome);
                        }
                    });
                });
            }
        }
    }

    fn reply(&self, id: u64, outcome: rpc::Outcome) {
        if let Err(e) = self.execute(rpc::reply(id, outcome)) {
            log::warn!("delivering the result of call {id} failed: {e}");
        }
    }
}

impl Drop for WebviewInner {
    fn drop(&mut self) {
        // Modules may still talk to the backend while they go away
        lock(&self.modules).clear();
        self.window.release_surface();
        log::debug!("webview {:?} destroyed", self.id);
    }
}

/// Handle to a webview. Cheap to clone; the webview lives as long as any handle.
///
/// Modules and long-lived callbacks should hold a [`WeakWebview`] instead, or the webview never
/// goes away.
#[derive(Clone)]
pub struct Webview {
    inner: Arc<WebviewInner>,
}

#[derive(Clone)]
pub struct WeakWebview {
    inner: Weak<WebviewInner>,
}

impl WeakWebview {
    pub fn upgrade(&self) -> Option<Webview> {
        self.inner.upgrade().map(|inner| Webview { inner })
    }
}

impl std::fmt::Debug for Webview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webview")
            .field("id", &self.inner.id)
            .field("window", &self.inner.window.id())
            .finish()
    }
}

impl Webview {
    /// Create a webview filling `window`. A window hosts at most one webview.
    pub fn new(
        window: &Window,
        backend: Box<dyn WebviewBackend>,
        preferences: Preferences,
    ) -> Result<Self, WebviewError> {
        let window = window.clone();
        let app = window.app().clone();
        app.dispatch(move || Self::create(window, backend, preferences))?
    }

    fn create(
        window: Window,
        backend: Box<dyn WebviewBackend>,
        preferences: Preferences,
    ) -> Result<Self, WebviewError> {
        if !window.claim_surface() {
            return Err(WebviewError::SurfaceExists);
        }

        let app = window.app().clone();
        let schemes = scheme::seal();

        let inner = Arc::new(WebviewInner {
            id: WebviewId::new(),
            app: app.clone(),
            window,
            events: WebEvents::default(),
            backend: Mutex::new(backend),
            state: Mutex::new(State::default()),
            embedded: Arc::new(RwLock::new(HashMap::new())),
            modules: Mutex::new(Modules::default()),
            rpc: Mutex::new(Rpc::default()),
        });

        let context = BackendContext {
            events: NativeEvents {
                webview: Arc::downgrade(&inner),
                app,
            },
            preferences,
            schemes,
        };
        inner.apply(|b| b.attach(context))?;

        let bootstrap = script::bootstrap(&lock(&inner.backend).post_message_script());
        inner.inject(Script::new(bootstrap, LoadTime::Creation).permanent(true))?;

        log::debug!("webview {:?} attached to window {:?}", inner.id, inner.window.id());
        Ok(Self { inner })
    }

    pub fn id(&self) -> WebviewId {
        self.inner.id
    }

    pub fn window(&self) -> &Window {
        &self.inner.window
    }

    pub fn app(&self) -> &Application {
        &self.inner.app
    }

    pub fn downgrade(&self) -> WeakWebview {
        WeakWebview {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run `f` on the UI thread with the webview state.
    fn ui<T, F>(&self, f: F) -> Result<T, WebviewError>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<WebviewInner>) -> T + Send + 'static,
    {
        let inner = self.inner.clone();
        Ok(self.inner.app.dispatch(move || f(&inner))?)
    }

    fn read<T, F>(&self, what: &'static str, f: F) -> T
    where
        T: Default + Send + 'static,
        F: FnOnce(&dyn WebviewBackend) -> anyhow::Result<T> + Send + 'static,
    {
        self.ui(move |w| w.query(what, f)).unwrap_or_else(|e| {
            log::warn!("reading webview {what} failed: {e}");
            T::default()
        })
    }

    fn write<F>(&self, f: F) -> Result<(), WebviewError>
    where
        F: FnOnce(&mut dyn WebviewBackend) -> anyhow::Result<()> + Send + 'static,
    {
        self.ui(move |w| w.apply(f))?
    }

    // ---------- Navigation ----------

    /// URL of the current page. Empty before the first navigation.
    pub fn url(&self) -> String {
        self.read("url", |b| b.url())
    }

    pub fn set_url(&self, url: impl AsRef<str>) -> Result<(), WebviewError> {
        let url = Url::parse(url.as_ref())?;
        self.write(move |b| b.navigate(url.as_str()))
    }

    /// Navigate to a local file.
    pub fn set_file(&self, path: impl AsRef<Path>) -> Result<(), WebviewError> {
        let path = path.as_ref();
        let absolute = std::fs::canonicalize(path)
            .map_err(|e| WebviewError::InvalidPath(format!("{}: {e}", path.display())))?;
        let url = Url::from_file_path(&absolute)
            .map_err(|()| WebviewError::InvalidPath(absolute.display().to_string()))?;

        self.set_url(url)
    }

    /// Navigate to an embedded file. See [`embed`](Self::embed).
    pub fn serve(&self, path: &str) -> Result<(), WebviewError> {
        self.set_url(embed::url_for(path))
    }

    pub fn back(&self) -> Result<(), WebviewError> {
        self.write(|b| b.back())
    }

    pub fn forward(&self) -> Result<(), WebviewError> {
        self.write(|b| b.forward())
    }

    pub fn reload(&self) -> Result<(), WebviewError> {
        self.write(|b| b.reload())
    }

    // ---------- Page state & settings ----------

    pub fn page_title(&self) -> String {
        self.read("page title", |b| b.page_title())
    }

    /// Favicon of the current page. Empty if there is none or it could not be read.
    pub fn favicon(&self) -> Icon {
        self.read("favicon", |b| b.favicon())
    }

    pub fn dev_tools(&self) -> bool {
        self.read("dev tools", |b| b.dev_tools())
    }

    pub fn set_dev_tools(&self, enabled: bool) -> Result<(), WebviewError> {
        self.write(move |b| b.set_dev_tools(enabled))
    }

    pub fn context_menu(&self) -> bool {
        self.read("context menu", |b| b.context_menu())
    }

    pub fn set_context_menu(&self, enabled: bool) -> Result<(), WebviewError> {
        self.write(move |b| b.set_context_menu(enabled))
    }

    pub fn background(&self) -> Color {
        self.read("background", |b| b.background())
    }

    pub fn set_background(&self, color: Color) -> Result<(), WebviewError> {
        self.write(move |b| b.set_background(color))
    }

    pub fn force_dark_mode(&self) -> bool {
        self.read("dark mode", |b| b.force_dark_mode())
    }

    pub fn set_force_dark_mode(&self, enabled: bool) -> Result<(), WebviewError> {
        self.write(move |b| b.set_force_dark_mode(enabled))
    }

    // ---------- Scripts ----------

    pub fn inject(&self, script: Script) -> Result<ScriptId, WebviewError> {
        self.ui(move |w| w.inject(script))?
    }

    /// Remove one injected script, permanent or not. Returns whether it existed.
    pub fn remove_script(&self, id: ScriptId) -> Result<bool, WebviewError> {
        self.ui(move |w| w.remove_script(id))?
    }

    /// Remove every injected script that is not permanent.
    pub fn clear_scripts(&self) -> Result<(), WebviewError> {
        self.ui(|w| w.clear_scripts())?
    }

    /// Injected scripts in injection order.
    pub fn scripts(&self) -> Vec<(ScriptId, Script)> {
        let state = lock(&self.inner.state);
        state.scripts.iter().map(|s| (s.id, s.script.clone())).collect()
    }

    /// Run `code` in the page. Held back until the DOM of the current page is ready.
    pub fn execute(&self, code: impl Into<String>) -> Result<(), WebviewError> {
        let code = code.into();
        self.ui(move |w| w.execute(code))?
    }

    // ---------- Schemes ----------

    /// Route requests for `name` to `resolver`. Returns `false` if the scheme is already handled.
    pub fn handle_scheme<F>(&self, name: impl Into<String>, resolver: F, policy: Launch) -> Result<bool, WebviewError>
    where
        F: Fn(Request, Executor) + Send + Sync + 'static,
    {
        let name = name.into();
        let resolver: Resolver = Arc::new(resolver);
        self.ui(move |w| w.handle_scheme(name, resolver, policy))?
    }

    pub fn remove_scheme(&self, name: impl Into<String>) -> Result<bool, WebviewError> {
        let name = name.into();
        self.ui(move |w| w.remove_scheme(&name))?
    }

    // ---------- Embedded files ----------

    /// Add `files` to the embedded origin, replacing files with the same path. A leading `/` in a
    /// path is ignored.
    ///
    /// `policy` decides where requests for embedded files are answered. The latest call wins.
    pub fn embed(&self, files: HashMap<String, EmbeddedFile>, policy: Launch) -> Result<(), WebviewError> {
        write(&self.inner.embedded).extend(
            files
                .into_iter()
                .map(|(path, file)| (path.trim_start_matches('/').to_string(), file)),
        );

        {
            let mut state = lock(&self.inner.state);
            if let Some((_, launch)) = state.schemes.get_mut(BUILTIN_SCHEME) {
                if *launch != policy {
                    log::debug!("embedded files are now resolved with {policy:?}");
                    *launch = policy;
                }
                return Ok(());
            }
        }

        let table = self.inner.embedded.clone();
        self.handle_scheme(BUILTIN_SCHEME, move |request, executor| embed::resolve(&table, request, executor), policy)?;
        Ok(())
    }

    /// Drop every embedded file and stop serving the embedded origin.
    pub fn clear_embedded(&self) -> Result<(), WebviewError> {
        write(&self.inner.embedded).clear();
        self.remove_scheme(BUILTIN_SCHEME)?;
        Ok(())
    }

    pub fn clear_embedded_file(&self, path: &str) -> bool {
        write(&self.inner.embedded).remove(path.trim_start_matches('/')).is_some()
    }

    // ---------- Modules ----------

    /// Construct `M` once for this webview. If it already exists the existing instance is returned
    /// and `init` is not called.
    pub fn add_module<M, F>(&self, init: F) -> Result<Arc<M>, WebviewError>
    where
        M: Module,
        F: FnOnce(&Webview, Natives) -> M + Send + 'static,
    {
        self.ui(move |inner| {
            if let Some(existing) = lock(&inner.modules).get::<M>() {
                log::warn!("module {} already added", std::any::type_name::<M>());
                return existing;
            }

            let webview = Webview { inner: inner.clone() };
            let module = init(&webview, inner.natives());
            lock(&inner.modules).insert(module)
        })
    }

    pub fn module<M: Module>(&self) -> Option<Arc<M>> {
        lock(&self.inner.modules).get::<M>()
    }

    // ---------- Natives ----------

    /// Stable descriptor of the native window and webview.
    pub fn natives(&self) -> Result<Natives, WebviewError> {
        self.ui(|w| w.natives())
    }

    /// Pointer to the concrete backend, if it is a `B`.
    ///
    /// # Safety
    ///
    /// Only dereference on the UI thread while this webview is alive, and never while another
    /// webview call is in progress.
    #[cfg(feature = "unstable")]
    pub unsafe fn native_unstable<B: WebviewBackend>(&self) -> Option<std::ptr::NonNull<B>> {
        if !self.inner.app.thread_safe() {
            log::warn!("native_unstable() must be called on the UI thread");
            return None;
        }

        let mut backend = lock(&self.inner.backend);
        backend.as_any_mut().downcast_mut::<B>().map(std::ptr::NonNull::from)
    }

    // ---------- Script bridge ----------

    /// Make `function` callable from the page as `window.saucer.exposed.<name>(..)`. Returns
    /// `false` if the name is taken.
    pub fn expose<Args, F>(&self, name: impl Into<String>, function: F, policy: Launch) -> bool
    where
        Args: 'static,
        F: Function<Args>,
    {
        lock(&self.inner.rpc).expose(name.into(), Exposed::new(function, policy))
    }

    pub fn unexpose(&self, name: &str) -> bool {
        lock(&self.inner.rpc).unexpose(name)
    }

    pub fn clear_exposed(&self) {
        lock(&self.inner.rpc).clear();
    }

    /// Evaluate the expression `code` in the page, with each `{}` replaced by the JSON literal of
    /// the next argument.
    ///
    /// ```rust,ignore
    /// let sum: i64 = webview.evaluate("{} + {}", (2, 3)).await?;
    /// ```
    pub fn evaluate<T: DeserializeOwned>(&self, code: &str, args: impl Arguments) -> Evaluation<T> {
        let app = self.inner.app.clone();

        let code = match args.literals().and_then(|literals| rpc::format(code, &literals)) {
            Ok(code) => code,
            Err(e) => return Evaluation::failed(app, e),
        };

        let (tx, rx) = oneshot::channel();
        self.inner.on_ui_thread(move |inner| {
            let id = lock(&inner.rpc).register(tx);
            if let Err(e) = inner.execute(rpc::evaluation(id, &code)) {
                lock(&inner.rpc).settle(id, Err(Value::String(e.to_string())));
            }
        });

        Evaluation::pending(app, rx)
    }

    // ---------- Events ----------

    /// Subscribe to `E`. Listeners run on the UI thread.
    pub fn on<E>(&self, callback: impl Fn(&E::Args) -> E::Output + Send + Sync + 'static) -> EventId
    where
        E: EventKind<Manager = WebEvents, Tag = WebEvent>,
    {
        let id = E::slot(&self.inner.events).add(callback);
        self.wire(E::TAG);
        id
    }

    pub fn once<E>(&self, callback: impl Fn(&E::Args) -> E::Output + Send + Sync + 'static) -> EventId
    where
        E: EventKind<Manager = WebEvents, Tag = WebEvent>,
    {
        let id = E::slot(&self.inner.events).once(callback);
        self.wire(E::TAG);
        id
    }

    pub fn remove(&self, event: WebEvent, id: EventId) {
        self.inner.events.remove(event, id);
    }

    pub fn clear(&self, event: WebEvent) {
        self.inner.events.clear(event);
    }

    pub fn clear_all(&self) {
        self.inner.events.clear_all();
    }

    fn wire(&self, event: WebEvent) {
        if event.lazy() {
            self.inner.on_ui_thread(move |inner| inner.wire(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::headless::{HeadlessPage, HeadlessWebview, HeadlessWindow};
    use crate::config::AppOptions;
    use crate::errors::{RpcError, SchemeError};
    use crate::scheme::Response;
    use crate::script::Frame;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn app() -> Application {
        let _ = env_logger::builder().is_test(true).try_init();
        Application::new(AppOptions::builder().threads(2).build().unwrap()).unwrap()
    }

    fn webview(app: &Application) -> (Webview, HeadlessPage) {
        let (window, _) = HeadlessWindow::new();
        let window = Window::new(app, Box::new(window)).unwrap();
        let (backend, page) = HeadlessWebview::new();
        let webview = Webview::new(&window, Box::new(backend), Preferences::default()).unwrap();
        (webview, page)
    }

    /// A webview whose page finished loading, with the execution log emptied.
    fn loaded(app: &Application) -> (Webview, HeadlessPage) {
        let (webview, page) = webview(app);
        webview.set_url("https://example.test/").unwrap();
        app.run_pending();
        page.take_executed();
        (webview, page)
    }

    fn replies(page: &HeadlessPage) -> Vec<Value> {
        page.executed()
            .iter()
            .filter_map(|code| {
                code.strip_prefix("window.saucer.internal.receive(")
                    .and_then(|rest| rest.strip_suffix(");"))
                    .map(|json| serde_json::from_str(json).unwrap())
            })
            .collect()
    }

    fn evaluation_id(code: &str) -> Option<u64> {
        let rest = code.strip_prefix("window.saucer.internal.resolve(")?;
        rest.split(',').next()?.trim().parse().ok()
    }

    fn pump_until(app: &Application, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition never became true");
            app.run_pending();
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn bootstrap_is_injected_permanently() {
        let app = app();
        let (webview, page) = webview(&app);

        let scripts = webview.scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].1.permanent);
        assert_eq!(scripts[0].1.time, LoadTime::Creation);

        let injected = page.injected();
        assert!(injected[0].contains(&page.post_message_script()));
        assert!(page.declared_schemes().contains(&BUILTIN_SCHEME.to_string()));

        // The scheme table is sealed once a webview exists
        assert!(!scheme::register("too-late"));
    }

    #[test]
    fn navigation_can_be_vetoed() {
        let app = app();
        let (webview, page) = webview(&app);

        let seen = Arc::new(Mutex::new(Vec::new()));
        webview.on::<events::Navigate>(|nav| {
            if nav.url.contains("blocked") { Policy::Block } else { Policy::Allow }
        });
        let sink = seen.clone();
        webview.on::<events::Navigated>(move |url| sink.lock().unwrap().push(url.clone()));

        webview.set_url("https://example.test/blocked").unwrap();
        app.run_pending();
        assert_eq!(webview.url(), "");

        webview.set_url("https://example.test/fine").unwrap();
        app.run_pending();
        assert_eq!(webview.url(), "https://example.test/fine");
        assert_eq!(*seen.lock().unwrap(), vec!["https://example.test/fine".to_string()]);
        assert_eq!(page.history(), vec!["https://example.test/fine".to_string()]);
    }

    #[test]
    fn load_and_dom_ready_fire_in_order() {
        let app = app();
        let (webview, _page) = webview(&app);

        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = order.clone();
        webview.on::<events::Load>(move |state| sink.lock().unwrap().push(format!("{state:?}")));
        let sink = order.clone();
        webview.on::<events::DomReady>(move |_| sink.lock().unwrap().push("DomReady".into()));

        webview.set_url("https://example.test/").unwrap();
        app.run_pending();

        assert_eq!(*order.lock().unwrap(), vec!["Started", "DomReady", "Finished"]);
    }

    #[test]
    fn ready_scripts_wait_for_dom_ready_in_injection_order() {
        let app = app();
        let (webview, page) = webview(&app);

        webview.inject(Script::new("first()", LoadTime::Ready).frame(Frame::All)).unwrap();
        webview.inject(Script::new("second()", LoadTime::Ready).frame(Frame::All)).unwrap();
        webview.execute("queued()").unwrap();
        assert!(page.executed().is_empty());

        webview.set_url("https://example.test/").unwrap();
        app.run_pending();
        assert_eq!(page.executed(), vec!["first()", "second()", "queued()"]);

        // Once loaded, code runs right away
        webview.execute("now()").unwrap();
        assert_eq!(page.executed().last().unwrap(), "now()");
    }

    #[test]
    fn clear_scripts_keeps_permanent_ones() {
        let app = app();
        let (webview, page) = webview(&app);

        let keep = webview.inject(Script::new("keep()", LoadTime::Creation).permanent(true)).unwrap();
        webview.inject(Script::new("drop()", LoadTime::Creation)).unwrap();
        webview.inject(Script::new("later()", LoadTime::Ready)).unwrap();
        assert_eq!(page.injected().len(), 3);

        webview.clear_scripts().unwrap();

        let scripts = webview.scripts();
        assert_eq!(scripts.len(), 2);
        assert!(scripts.iter().all(|(_, s)| s.permanent));
        assert_eq!(page.injected().len(), 2);

        assert!(webview.remove_script(keep).unwrap());
        assert!(!webview.remove_script(keep).unwrap());
        assert_eq!(page.injected().len(), 1);
    }

    #[test]
    fn exposed_functions_answer_calls() {
        let app = app();
        let (webview, page) = loaded(&app);

        assert!(webview.expose("add", |a: i64, b: i64| Ok::<_, String>(a + b), Launch::Sync));
        page.post_message(r#"{"saucer:call":true,"name":"add","params":[2,3],"id":1}"#);
        app.run_pending();

        assert_eq!(replies(&page), vec![json!({ "saucer:resolve": true, "id": 1, "result": 5 })]);
    }

    #[test]
    fn unknown_calls_and_garbage_are_dropped() {
        let app = app();
        let (webview, page) = loaded(&app);
        webview.expose("known", || Ok::<_, String>(true), Launch::Sync);

        page.post_message(r#"{"saucer:call":true,"name":"unknown","params":[],"id":1}"#);
        page.post_message("definitely not json");
        page.post_message(r#"{"saucer:resolve":true,"id":77,"result":1}"#);
        app.run_pending();

        assert!(page.executed().is_empty());
    }

    #[test]
    fn failing_calls_are_rejected() {
        let app = app();
        let (webview, page) = loaded(&app);
        webview.expose("div", |a: f64, b: f64| {
            if b == 0.0 { Err("division by zero") } else { Ok(a / b) }
        }, Launch::Sync);

        page.post_message(r#"{"saucer:call":true,"name":"div","params":[1,0],"id":3}"#);
        page.post_message(r#"{"saucer:call":true,"name":"div","params":[1],"id":4}"#);
        app.run_pending();

        let replies = replies(&page);
        assert_eq!(replies[0]["error"], json!("division by zero"));
        assert_eq!(replies[1]["id"], json!(4));
        assert!(replies[1].get("error").is_some());
    }

    #[test]
    fn async_functions_run_on_the_pool() {
        let app = app();
        let (webview, page) = loaded(&app);
        let ui = thread::current().id();

        webview.expose("where", move || Ok::<_, String>(thread::current().id() != ui), Launch::Async);
        page.post_message(r#"{"saucer:call":true,"name":"where","params":[],"id":9}"#);

        pump_until(&app, || !replies(&page).is_empty());
        assert_eq!(replies(&page)[0]["result"], json!(true));
    }

    #[test]
    fn unexposed_functions_stop_answering() {
        let app = app();
        let (webview, page) = loaded(&app);
        webview.expose("f", || Ok::<_, String>(1), Launch::Sync);
        assert!(webview.unexpose("f"));

        webview.expose("g", || Ok::<_, String>(2), Launch::Sync);
        webview.clear_exposed();

        page.post_message(r#"{"saucer:call":true,"name":"f","params":[],"id":1}"#);
        page.post_message(r#"{"saucer:call":true,"name":"g","params":[],"id":2}"#);
        app.run_pending();
        assert!(page.executed().is_empty());
    }

    #[test]
    fn evaluations_resolve_from_the_page() {
        let app = app();
        let (webview, page) = loaded(&app);

        let sum = webview.evaluate::<i64>("{} + {}", (2, 3));
        let executed = page.executed();
        assert_eq!(executed, vec!["window.saucer.internal.resolve(1, (async () => (2 + 3))());"]);

        page.post_message(r#"{"saucer:resolve":true,"id":1,"result":5}"#);
        // A late duplicate changes nothing
        page.post_message(r#"{"saucer:resolve":true,"id":1,"result":6}"#);
        app.run_pending();

        assert_eq!(sum.now_or_never().unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn evaluations_can_be_awaited() {
        let app = app();
        let (webview, page) = loaded(&app);

        let parts = webview.evaluate::<Vec<String>>("{}.split(',')", ("a,b",));
        page.post_message(r#"{"saucer:resolve":true,"id":1,"result":["a","b"]}"#);
        app.run_pending();

        assert_eq!(parts.await.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn evaluations_wait_for_the_dom() {
        let app = app();
        let (webview, page) = webview(&app);

        let mut title = webview.evaluate::<String>("document.title", ());
        assert!(page.executed().is_empty());
        assert!((&mut title).now_or_never().is_none());

        webview.set_url("https://example.test/").unwrap();
        app.run_pending();
        let id = page.executed().iter().find_map(|c| evaluation_id(c)).unwrap();

        page.post_message(format!(r#"{{"saucer:resolve":true,"id":{id},"error":"no document"}}"#));
        app.run_pending();
        assert!(matches!(title.now_or_never(), Some(Err(RpcError::Rejected(_)))));
    }

    #[test]
    fn evaluations_can_be_awaited_from_other_threads() {
        let app = app();
        let (webview, page) = loaded(&app);

        let remote = webview.clone();
        let worker = thread::spawn(move || remote.evaluate::<String>("document.title", ()).wait());

        pump_until(&app, || page.executed().iter().any(|c| evaluation_id(c).is_some()));
        let id = page.executed().iter().find_map(|c| evaluation_id(c)).unwrap();

        page.post_message(format!(r#"{{"saucer:resolve":true,"id":{id},"result":"hello"}}"#));
        app.run_pending();
        assert_eq!(worker.join().unwrap().unwrap(), "hello");
    }

    #[test]
    fn bad_format_strings_fail_early() {
        let app = app();
        let (webview, page) = loaded(&app);

        let result = webview.evaluate::<i64>("{} + {}", (1,)).now_or_never().unwrap();
        assert!(matches!(result, Err(RpcError::Format(_))));
        assert!(page.executed().is_empty());
    }

    #[test]
    fn schemes_route_by_exact_name() {
        let app = app();
        let (webview, page) = webview(&app);

        let first = webview
            .handle_scheme("app", |_req, exec: Executor| exec.resolve(Response::new("first", "text/plain")), Launch::Sync)
            .unwrap();
        let second = webview
            .handle_scheme("app", |_req, exec: Executor| exec.resolve(Response::new("second", "text/plain")), Launch::Sync)
            .unwrap();
        assert!(first);
        assert!(!second);
        assert!(page.schemes().contains(&"app".to_string()));

        let response = page.request("app://host/index.html").unwrap().take().unwrap().unwrap();
        assert_eq!(response.data, b"first");

        assert!(page.request("appx://host/index.html").is_none());
        assert!(page.request("other://host/").is_none());

        assert!(webview.remove_scheme("app").unwrap());
        assert!(page.request("app://host/index.html").is_none());
        assert!(!page.schemes().contains(&"app".to_string()));
    }

    #[test]
    fn async_resolvers_answer_on_the_ui_thread() {
        let app = app();
        let (webview, page) = webview(&app);

        webview
            .handle_scheme("slow", |_req, exec: Executor| exec.reject(SchemeError::Denied), Launch::Async)
            .unwrap();

        let pending = page.request("slow://host/").unwrap();
        pump_until(&app, || pending.ready());
        assert_eq!(pending.take(), Some(Err(SchemeError::Denied)));
    }

    #[test]
    fn embedded_files_are_served() {
        let app = app();
        let (webview, page) = webview(&app);

        let files = HashMap::from([
            ("index.html".to_string(), EmbeddedFile::new("<h1>hi</h1>", "text/html")),
            ("app.js".to_string(), EmbeddedFile::new("run()", "text/javascript")),
        ]);
        webview.embed(files, Launch::Sync).unwrap();

        webview.serve("index.html").unwrap();
        app.run_pending();
        assert_eq!(webview.url(), "saucer://embedded/index.html");

        let index = page.request("saucer://embedded/index.html").unwrap().take().unwrap().unwrap();
        assert_eq!(index.data, b"<h1>hi</h1>");
        assert_eq!(index.mime, "text/html");

        let missing = page.request("saucer://embedded/nope.css").unwrap().take().unwrap();
        assert_eq!(missing, Err(SchemeError::NotFound));

        assert!(webview.clear_embedded_file("app.js"));
        let gone = page.request("saucer://embedded/app.js").unwrap().take().unwrap();
        assert_eq!(gone, Err(SchemeError::NotFound));

        webview.clear_embedded().unwrap();
        assert!(page.request("saucer://embedded/index.html").is_none());
    }

    #[test]
    fn lazy_events_wire_and_unwire_the_backend() {
        let app = app();
        let (webview, page) = webview(&app);
        assert!(!page.subscribed(WebEvent::Title));

        let titles = Arc::new(Mutex::new(Vec::new()));
        let sink = titles.clone();
        let id = webview.on::<events::Title>(move |title| sink.lock().unwrap().push(title.clone()));
        let other = webview.on::<events::Title>(|_| {});
        assert!(page.subscribed(WebEvent::Title));

        page.set_title("Hello");
        app.run_pending();
        assert_eq!(*titles.lock().unwrap(), vec!["Hello".to_string()]);

        webview.remove(WebEvent::Title, id);
        assert!(page.subscribed(WebEvent::Title));
        webview.remove(WebEvent::Title, other);
        assert!(!page.subscribed(WebEvent::Title));

        // Wiring comes back with the next listener
        webview.once::<events::Title>(|_| {});
        assert!(page.subscribed(WebEvent::Title));
        page.set_title("Again");
        app.run_pending();
        assert!(!page.subscribed(WebEvent::Title));
    }

    #[test]
    fn subscribing_off_thread_wires_on_the_ui_thread() {
        let app = app();
        let (webview, page) = webview(&app);

        let remote = webview.clone();
        thread::spawn(move || remote.on::<events::Load>(|_| {})).join().unwrap();
        assert!(!page.subscribed(WebEvent::Load));

        app.run_pending();
        assert!(page.subscribed(WebEvent::Load));
    }

    #[test]
    fn null_rejections_reject_evaluations() {
        let app = app();
        let (webview, page) = loaded(&app);

        let rejected = webview.evaluate::<()>("Promise.reject(null)", ());
        let fulfilled = webview.evaluate::<()>("null", ());
        page.post_message(r#"{"saucer:resolve":true,"id":1,"error":null}"#);
        page.post_message(r#"{"saucer:resolve":true,"id":2,"result":null}"#);
        app.run_pending();

        assert!(matches!(rejected.now_or_never(), Some(Err(RpcError::Rejected(Value::Null)))));
        assert!(matches!(fulfilled.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn dropping_the_webview_abandons_evaluations() {
        let app = app();
        let (webview, page) = loaded(&app);

        let title = webview.evaluate::<String>("document.title", ());
        assert!(page.executed().iter().any(|c| evaluation_id(c).is_some()));

        drop(webview);
        assert!(matches!(title.now_or_never(), Some(Err(RpcError::Abandoned))));
    }

    #[test]
    fn failed_removals_keep_their_scripts() {
        let app = app();
        let (webview, page) = webview(&app);

        let stuck = webview.inject(Script::new("stuck()", LoadTime::Creation)).unwrap();
        webview.inject(Script::new("loose()", LoadTime::Creation)).unwrap();
        webview.inject(Script::new("later()", LoadTime::Ready)).unwrap();
        page.pin_injection("stuck()");

        assert!(matches!(webview.clear_scripts(), Err(WebviewError::Backend(_))));

        // Every removal was attempted, only the refused one is left
        let injected = page.injected();
        assert_eq!(injected.len(), 2);
        assert!(injected.iter().any(|s| s.contains("stuck()")));
        assert!(!injected.iter().any(|s| s.contains("loose()")));

        let ids: Vec<ScriptId> = webview.scripts().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&stuck));

        assert!(matches!(webview.remove_script(stuck), Err(WebviewError::Backend(_))));
        assert!(webview.scripts().iter().any(|(id, _)| *id == stuck));
    }

    #[test]
    fn embedded_paths_ignore_a_leading_slash() {
        let app = app();
        let (webview, page) = webview(&app);

        let files = HashMap::from([("/index.html".to_string(), EmbeddedFile::new("<p>root</p>", "text/html"))]);
        webview.embed(files, Launch::Sync).unwrap();

        let index = page.request("saucer://embedded/index.html").unwrap().take().unwrap().unwrap();
        assert_eq!(index.data, b"<p>root</p>");

        assert!(webview.clear_embedded_file("/index.html"));
        let gone = page.request("saucer://embedded/index.html").unwrap().take().unwrap();
        assert_eq!(gone, Err(SchemeError::NotFound));
    }

    #[test]
    fn embed_uses_the_latest_policy() {
        let app = app();
        let (webview, page) = webview(&app);

        let first = HashMap::from([("a.txt".to_string(), EmbeddedFile::new("a", "text/plain"))]);
        webview.embed(first, Launch::Sync).unwrap();
        assert!(page.request("saucer://embedded/a.txt").unwrap().ready());

        let second = HashMap::from([("b.txt".to_string(), EmbeddedFile::new("b", "text/plain"))]);
        webview.embed(second, Launch::Async).unwrap();

        let pending = page.request("saucer://embedded/b.txt").unwrap();
        assert!(!pending.ready());
        pump_until(&app, || pending.ready());
        assert_eq!(pending.take().unwrap().unwrap().data, b"b");
    }

    #[test]
    fn clearing_events_unwires_the_backend() {
        let app = app();
        let (webview, page) = webview(&app);

        let ready = Arc::new(AtomicUsize::new(0));
        let counter = ready.clone();
        webview.on::<events::DomReady>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        webview.on::<events::Title>(|_| {});
        webview.on::<events::Load>(|_| {});
        assert!(page.subscribed(WebEvent::Title));
        assert!(page.subscribed(WebEvent::Load));

        webview.clear(WebEvent::Load);
        assert!(!page.subscribed(WebEvent::Load));
        assert!(page.subscribed(WebEvent::Title));

        webview.clear_all();
        assert!(!page.subscribed(WebEvent::Title));

        webview.set_url("https://example.test/").unwrap();
        app.run_pending();
        assert_eq!(ready.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn late_unsubscribes_keep_new_listeners_wired() {
        let app = app();
        let (webview, page) = webview(&app);

        let id = webview.on::<events::Title>(|_| {});
        assert!(page.subscribed(WebEvent::Title));

        let remote = webview.clone();
        thread::spawn(move || remote.remove(WebEvent::Title, id)).join().unwrap();

        // The unsubscribe is still queued when the next listener arrives
        webview.on::<events::Title>(|_| {});
        app.run_pending();
        assert!(page.subscribed(WebEvent::Title));
    }

    #[test]
    fn getters_degrade_when_the_backend_fails() {
        let app = app();
        let (webview, page) = webview(&app);

        page.set_favicon(Icon { data: vec![1, 2, 3] });
        assert_eq!(webview.favicon().data, vec![1, 2, 3]);

        page.break_favicon();
        assert_eq!(webview.favicon(), Icon::default());
    }

    #[test]
    fn settings_round_trip() {
        let app = app();
        let (webview, _page) = webview(&app);

        assert!(webview.context_menu());
        webview.set_dev_tools(true).unwrap();
        webview.set_context_menu(false).unwrap();
        webview.set_background([0, 0, 0, 0]).unwrap();
        webview.set_force_dark_mode(true).unwrap();

        assert!(webview.dev_tools());
        assert!(!webview.context_menu());
        assert_eq!(webview.background(), [0, 0, 0, 0]);
        assert!(webview.force_dark_mode());
    }

    #[test]
    fn dispatched_calls_match_direct_calls() {
        let app = app();
        let (webview, page) = loaded(&app);
        page.set_title("Same either way");

        let direct = webview.page_title();
        let remote = webview.clone();
        let worker = thread::spawn(move || {
            let title = remote.page_title();
            remote.app().quit();
            title
        });

        app.run();
        assert_eq!(worker.join().unwrap(), direct);
    }

    #[test]
    fn history_navigation() {
        let app = app();
        let (webview, _page) = webview(&app);

        webview.set_url("https://example.test/a").unwrap();
        app.run_pending();
        webview.set_url("https://example.test/b").unwrap();
        app.run_pending();

        webview.back().unwrap();
        app.run_pending();
        assert_eq!(webview.url(), "https://example.test/a");

        webview.forward().unwrap();
        app.run_pending();
        assert_eq!(webview.url(), "https://example.test/b");

        webview.reload().unwrap();
        app.run_pending();
        assert_eq!(webview.url(), "https://example.test/b");
    }

    #[test]
    fn invalid_targets_are_rejected() {
        let app = app();
        let (webview, _page) = webview(&app);

        assert!(matches!(webview.set_url("not a url"), Err(WebviewError::InvalidUrl(_))));
        assert!(matches!(
            webview.set_file("/definitely/not/here.html"),
            Err(WebviewError::InvalidPath(_))
        ));
    }

    #[test]
    fn modules_are_added_once() {
        struct Pinger {
            backend: Option<&'static str>,
            seen: AtomicUsize,
        }

        impl Module for Pinger {
            fn on_message(&self, message: &str) -> bool {
                if message.starts_with("pinger:") {
                    self.seen.fetch_add(1, Ordering::SeqCst);
                    return true;
                }
                false
            }
        }

        struct Missing;
        impl Module for Missing {}

        let app = app();
        let (webview, page) = loaded(&app);

        let pinger = webview
            .add_module(|_webview, natives| Pinger { backend: natives.webview_backend, seen: AtomicUsize::new(0) })
            .unwrap();
        let again = webview.add_module(|_, _| -> Pinger { unreachable!() }).unwrap();

        assert!(Arc::ptr_eq(&pinger, &again));
        assert!(Arc::ptr_eq(&pinger, &webview.module::<Pinger>().unwrap()));
        assert!(webview.module::<Missing>().is_none());
        assert_eq!(pinger.backend, Some("headless"));

        page.post_message("pinger:ping");
        page.post_message(r#"{"saucer:call":true,"name":"x","params":[],"id":1}"#);
        app.run_pending();
        assert_eq!(pinger.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn one_webview_per_window() {
        let app = app();
        let (window, _) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(window)).unwrap();

        let (backend, _) = HeadlessWebview::new();
        let first = Webview::new(&window, Box::new(backend), Preferences::default()).unwrap();

        let (backend, _) = HeadlessWebview::new();
        let second = Webview::new(&window, Box::new(backend), Preferences::default());
        assert!(matches!(second, Err(WebviewError::SurfaceExists)));

        drop(first);
        let (backend, _) = HeadlessWebview::new();
        assert!(Webview::new(&window, Box::new(backend), Preferences::default()).is_ok());
    }

    #[test]
    fn preferences_reach_the_backend() {
        let app = app();
        let (window, _) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(window)).unwrap();

        let (backend, page) = HeadlessWebview::new();
        let prefs = Preferences::builder().user_agent("Saucer/1.0").build();
        let _webview = Webview::new(&window, Box::new(backend), prefs).unwrap();

        assert_eq!(page.preferences().unwrap().user_agent.as_deref(), Some("Saucer/1.0"));
    }

    #[test]
    fn new_windows_ask_navigate_listeners() {
        let app = app();
        let (webview, page) = webview(&app);

        let flagged = Arc::new(AtomicUsize::new(0));
        let counter = flagged.clone();
        webview.on::<events::Navigate>(move |nav| {
            if nav.new_window {
                counter.fetch_add(1, Ordering::SeqCst);
                return Policy::Block;
            }
            Policy::Allow
        });

        assert_eq!(page.open_window("https://example.test/popup"), Policy::Block);
        assert_eq!(flagged.load(Ordering::SeqCst), 1);
    }
}
