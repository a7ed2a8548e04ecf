//! Core of a cross-platform webview toolkit.
//!
//! An [`Application`] owns the UI thread. [`Window`]s and [`Webview`]s are thread-safe handles
//! on top of pluggable native backends; every native call is marshalled onto the UI thread and
//! every listener runs there. A [`Webview`] adds a script bridge to the page (exposed functions
//! and evaluations), custom scheme handlers, an embedded file server, script injection and
//! extension modules.
//!
//! ```rust,no_run
//! use saucer::backends::headless::{HeadlessWebview, HeadlessWindow};
//! use saucer::{AppOptions, Application, Launch, Preferences, Webview, Window};
//!
//! # fn main() -> anyhow::Result<()> {
//! let app = Application::new(AppOptions::default())?;
//! let (window, _) = HeadlessWindow::new();
//! let window = Window::new(&app, Box::new(window))?;
//!
//! let (backend, _) = HeadlessWebview::new();
//! let webview = Webview::new(&window, Box::new(backend), Preferences::default())?;
//! webview.expose("add", |a: i64, b: i64| Ok::<_, String>(a + b), Launch::Sync);
//! webview.set_url("https://example.org/")?;
//!
//! app.run();
//! # Ok(()) }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod errors;
pub mod event;
pub mod module;
pub mod natives;
pub mod rpc;
pub mod scheme;
pub mod script;
pub mod webview;
pub mod window;

mod sync;

pub use app::{Application, Launch};
pub use config::{AppOptions, Preferences};
pub use errors::{AppError, RpcError, SchemeError, WebviewError, WindowError};
pub use event::{EventId, Policy};
pub use module::Module;
pub use natives::Natives;
pub use rpc::Evaluation;
pub use scheme::{Executor, Request, Response};
pub use script::{LoadTime, Script, ScriptId};
pub use webview::{EmbeddedFile, Webview, WebviewBackend};
pub use window::{Size, Window, WindowBackend};
