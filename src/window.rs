//! Native application windows.
//!
//! A [`Window`] is a thread-safe handle. Every call is carried out on the UI thread, directly when
//! already there and through [`Application::dispatch`] otherwise. A window hosts at most one
//! webview.

mod backend;
pub mod events;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::app::Application;
use crate::errors::WindowError;
use crate::event::{EventId, EventKind, Policy};
use crate::natives::Natives;
use crate::sync::lock;

pub use backend::{NativeWindowEvents, WindowBackend};
pub use events::{WindowEvent, WindowEvents};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(Uuid);

impl WindowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

/// Size of a window in logical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

pub(crate) struct WindowInner {
    id: WindowId,
    pub(crate) app: Application,
    pub(crate) events: WindowEvents,
    backend: Mutex<Box<dyn WindowBackend>>,
    /// Set while a webview is attached
    surface: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id)
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl WindowInner {
    fn query<T: Default>(&self, what: &str, f: impl FnOnce(&dyn WindowBackend) -> anyhow::Result<T>) -> T {
        let backend = lock(&self.backend);
        f(&**backend).unwrap_or_else(|e| {
            log::warn!("window {}: reading {what} failed: {e:#}", backend.name());
            T::default()
        })
    }

    fn apply(&self, f: impl FnOnce(&mut dyn WindowBackend) -> anyhow::Result<()>) -> Result<(), WindowError> {
        let mut backend = lock(&self.backend);
        f(&mut **backend).map_err(WindowError::Backend)
    }

    /// Ask the listeners, then tear the window down. Returns whether it closed.
    fn close(&self) -> Result<bool, WindowError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(true);
        }

        if self.events.close.until(Policy::Block, &()) {
            log::debug!("closing window {:?} was vetoed", self.id);
            return Ok(false);
        }

        self.apply(|b| b.close())?;
        self.finish_close();
        Ok(true)
    }

    /// A close coming from the native side. The backend destroys the window itself.
    pub(crate) fn close_requested(&self) -> Policy {
        if self.events.close.until(Policy::Block, &()) {
            return Policy::Block;
        }

        self.finish_close();
        Policy::Allow
    }

    fn finish_close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.events.closed.fire(&());
        }
    }

    pub(crate) fn natives(&self) -> Natives {
        let backend = lock(&self.backend);
        Natives::window(backend.name(), backend.window_handle(), backend.display_handle())
    }
}

impl Window {
    /// Create a window on the UI thread and attach `backend` to it.
    pub fn new(app: &Application, backend: Box<dyn WindowBackend>) -> Result<Self, WindowError> {
        let app = app.clone();
        app.clone().dispatch(move || Self::create(app, backend))?
    }

    fn create(app: Application, backend: Box<dyn WindowBackend>) -> Result<Self, WindowError> {
        let inner = Arc::new(WindowInner {
            id: WindowId::new(),
            app: app.clone(),
            events: WindowEvents::default(),
            backend: Mutex::new(backend),
            surface: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let events = NativeWindowEvents {
            window: Arc::downgrade(&inner),
            app,
        };
        inner.apply(|b| b.attach(events))?;

        log::debug!("window {:?} created", inner.id);
        Ok(Self { inner })
    }

    pub fn id(&self) -> WindowId {
        self.inner.id
    }

    pub fn app(&self) -> &Application {
        &self.inner.app
    }

    /// Run `f` on the UI thread with the window state.
    fn ui<T, F>(&self, f: F) -> Result<T, WindowError>
    where
        T: Send + 'static,
        F: FnOnce(&WindowInner) -> T + Send + 'static,
    {
        let inner = self.inner.clone();
        Ok(self.inner.app.dispatch(move || f(&inner))?)
    }

    fn read<T, F>(&self, what: &'static str, f: F) -> T
    where
        T: Default + Send + 'static,
        F: FnOnce(&dyn WindowBackend) -> anyhow::Result<T> + Send + 'static,
    {
        self.ui(move |w| w.query(what, f)).unwrap_or_else(|e| {
            log::warn!("reading window {what} failed: {e}");
            T::default()
        })
    }

    fn write<F>(&self, f: F) -> Result<(), WindowError>
    where
        F: FnOnce(&mut dyn WindowBackend) -> anyhow::Result<()> + Send + 'static,
    {
        self.ui(move |w| w.apply(f))?
    }

    pub fn title(&self) -> String {
        self.read("title", |b| b.title())
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), WindowError> {
        let title = title.into();
        self.write(move |b| b.set_title(&title))
    }

    pub fn visible(&self) -> bool {
        self.read("visibility", |b| b.visible())
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), WindowError> {
        self.write(move |b| b.set_visible(visible))
    }

    pub fn show(&self) -> Result<(), WindowError> {
        self.set_visible(true)
    }

    pub fn hide(&self) -> Result<(), WindowError> {
        self.set_visible(false)
    }

    pub fn size(&self) -> Size {
        self.read("size", |b| b.size())
    }

    pub fn set_size(&self, size: Size) -> Result<(), WindowError> {
        self.write(move |b| b.set_size(size))
    }

    pub fn focus(&self) -> Result<(), WindowError> {
        self.write(|b| b.focus())
    }

    /// Close the window unless a [`Close`](events::Close) listener vetoes it. Returns whether the
    /// window is closed afterwards.
    pub fn close(&self) -> Result<bool, WindowError> {
        self.ui(|w| w.close())?
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stable descriptor of the native window.
    pub fn natives(&self) -> Result<Natives, WindowError> {
        self.ui(|w| w.natives())
    }

    /// Pointer to the concrete backend, if it is a `B`.
    ///
    /// # Safety
    ///
    /// Only dereference on the UI thread while this window is alive, and never while another
    /// window call is in progress.
    #[cfg(feature = "unstable")]
    pub unsafe fn native_unstable<B: WindowBackend>(&self) -> Option<std::ptr::NonNull<B>> {
        if !self.inner.app.thread_safe() {
            log::warn!("native_unstable() must be called on the UI thread");
            return None;
        }

        let mut backend = lock(&self.inner.backend);
        backend.as_any_mut().downcast_mut::<B>().map(std::ptr::NonNull::from)
    }

    /// Subscribe to `E`. Listeners run on the UI thread.
    pub fn on<E>(&self, callback: impl Fn(&E::Args) -> E::Output + Send + Sync + 'static) -> EventId
    where
        E: EventKind<Manager = WindowEvents, Tag = WindowEvent>,
    {
        E::slot(&self.inner.events).add(callback)
    }

    pub fn once<E>(&self, callback: impl Fn(&E::Args) -> E::Output + Send + Sync + 'static) -> EventId
    where
        E: EventKind<Manager = WindowEvents, Tag = WindowEvent>,
    {
        E::slot(&self.inner.events).once(callback)
    }

    pub fn remove(&self, event: WindowEvent, id: EventId) {
        self.inner.events.remove(event, id);
    }

    pub fn clear(&self, event: WindowEvent) {
        self.inner.events.clear(event);
    }

    pub fn clear_all(&self) {
        self.inner.events.clear_all();
    }

    /// Reserve the window for a webview. Fails if one is attached already.
    pub(crate) fn claim_surface(&self) -> bool {
        self.inner
            .surface
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_surface(&self) {
        self.inner.surface.store(false, Ordering::Release);
    }

    pub(crate) fn inner(&self) -> &Arc<WindowInner> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::headless::HeadlessWindow;
    use crate::config::AppOptions;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn app() -> Application {
        let _ = env_logger::builder().is_test(true).try_init();
        Application::new(AppOptions::builder().threads(1).build().unwrap()).unwrap()
    }

    #[test]
    fn setters_round_trip_through_the_backend() {
        let app = app();
        let (backend, handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        window.set_title("hello").unwrap();
        window.set_size(Size::new(800, 600)).unwrap();
        window.show().unwrap();

        assert_eq!(window.title(), "hello");
        assert_eq!(window.size(), Size::new(800, 600));
        assert!(window.visible());
        assert_eq!(handle.title(), "hello");
    }

    #[test]
    fn dispatched_calls_match_direct_calls() {
        let app = app();
        let (backend, _handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();
        window.set_title("same").unwrap();

        let direct = window.title();
        let remote = window.clone();
        let worker = thread::spawn(move || {
            let title = remote.title();
            remote.app().quit();
            title
        });

        app.run();
        assert_eq!(worker.join().unwrap(), direct);
    }

    #[test]
    fn close_can_be_vetoed() {
        let app = app();
        let (backend, handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        let closed = Arc::new(AtomicUsize::new(0));
        let veto = window.on::<events::Close>(|_| Policy::Block);
        let counter = closed.clone();
        window.on::<events::Closed>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!window.close().unwrap());
        assert!(!handle.destroyed());
        assert!(!window.closed());

        window.remove(WindowEvent::Close, veto);
        assert!(window.close().unwrap());
        assert!(handle.destroyed());
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        // Closing again changes nothing
        assert!(window.close().unwrap());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn native_close_requests_honour_vetoes() {
        let app = app();
        let (backend, handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        let id = window.on::<events::Close>(|_| Policy::Block);
        assert_eq!(handle.request_close(), Policy::Block);
        assert!(!window.closed());

        window.remove(WindowEvent::Close, id);
        assert_eq!(handle.request_close(), Policy::Allow);
        assert!(window.closed());
    }

    #[test]
    fn native_events_are_delivered_on_the_ui_thread() {
        let app = app();
        let (backend, handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ui = thread::current().id();
        window.on::<events::Resize>(move |size| {
            assert_eq!(thread::current().id(), ui);
            sink.lock().unwrap().push(*size);
        });

        let remote = handle.clone();
        thread::spawn(move || remote.resize(Size::new(10, 20))).join().unwrap();
        assert!(seen.lock().unwrap().is_empty());

        app.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![Size::new(10, 20)]);
    }

    #[test]
    fn focus_changes_are_reported() {
        let app = app();
        let (backend, handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        window.on::<events::Focus>(move |focused| sink.lock().unwrap().push(*focused));

        handle.focus(false);
        window.focus().unwrap();
        app.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn cleared_events_stop_firing() {
        let app = app();
        let (backend, handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        window.on::<events::Resize>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = count.clone();
        window.on::<events::Focus>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        window.on::<events::Close>(|_| Policy::Block);

        window.clear(WindowEvent::Resize);
        handle.resize(Size::new(1, 1));
        handle.focus(true);
        app.run_pending();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        window.clear_all();
        handle.focus(false);
        app.run_pending();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Nobody vetoes anymore
        assert!(window.close().unwrap());
        assert!(handle.destroyed());
    }

    #[test]
    fn one_surface_per_window() {
        let app = app();
        let (backend, _handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        assert!(window.claim_surface());
        assert!(!window.claim_surface());
        window.release_surface();
        assert!(window.claim_surface());
    }

    #[test]
    fn natives_name_the_backend() {
        let app = app();
        let (backend, _handle) = HeadlessWindow::new();
        let window = Window::new(&app, Box::new(backend)).unwrap();

        let natives = window.natives().unwrap();
        assert_eq!(natives.window_backend, "headless");
        assert_eq!(natives.webview_backend, None);
    }
}
