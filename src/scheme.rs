//! Custom URL schemes.
//!
//! A webview routes requests for a handled scheme to a [`Resolver`]. The resolver gets the request
//! and an [`Executor`] and must settle it exactly once, through [`Executor::resolve`] or
//! [`Executor::reject`]. Depending on the [`Launch`] policy the resolver runs inline on the thread
//! that delivered the native request or on the application's worker pool. Either way the answer
//! reaches the backend's [`Responder`] on the UI thread.
//!
//! Some backends need every scheme declared before the first webview exists. [`register`] records
//! names in a process-wide table that is sealed when the first webview is created.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use lazy_static::lazy_static;

use crate::app::{Application, Launch};
use crate::sync::lock;

pub use crate::errors::SchemeError;

/// Scheme used for embedded files and always registered.
pub const BUILTIN_SCHEME: &str = "saucer";

/// An intercepted request. The body is fully buffered.
pub type Request = http::Request<Vec<u8>>;

/// Handles requests for one scheme.
pub type Resolver = Arc<dyn Fn(Request, Executor) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub data: Vec<u8>,
    pub mime: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Response {
    pub fn new(data: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Convert into an `http` response with the content type set from `mime`.
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut response = http::Response::new(self.data);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        if let Ok(mime) = HeaderValue::from_str(&self.mime) {
            response.headers_mut().insert(CONTENT_TYPE, mime);
        }

        response
    }
}

/// The backend's deferred answer to a native request.
pub trait Responder: Send + 'static {
    fn respond(self: Box<Self>, result: Result<Response, SchemeError>);
}

impl<F> Responder for F
where
    F: FnOnce(Result<Response, SchemeError>) + Send + 'static,
{
    fn respond(self: Box<Self>, result: Result<Response, SchemeError>) {
        (*self)(result)
    }
}

/// Settles one request. Consumed by either call, so a request cannot be settled twice.
pub struct Executor {
    app: Application,
    responder: Option<Box<dyn Responder>>,
}

impl Executor {
    pub(crate) fn new(app: Application, responder: Box<dyn Responder>) -> Self {
        Self {
            app,
            responder: Some(responder),
        }
    }

    pub fn resolve(mut self, response: Response) {
        self.settle(Ok(response));
    }

    pub fn reject(mut self, error: SchemeError) {
        self.settle(Err(error));
    }

    fn settle(&mut self, result: Result<Response, SchemeError>) {
        let Some(responder) = self.responder.take() else {
            return;
        };

        if self.app.thread_safe() {
            responder.respond(result);
            return;
        }

        if !self.app.post(move || responder.respond(result)) {
            log::debug!("scheme response arrived after shutdown, dropping it");
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if self.responder.is_some() {
            log::warn!("scheme request dropped without being resolved or rejected, it stays pending");
        }
    }
}

/// Run `resolver` for `request` according to `policy`.
pub(crate) fn launch(
    app: &Application,
    resolver: Resolver,
    policy: Launch,
    request: Request,
    responder: Box<dyn Responder>,
) {
    let executor = Executor::new(app.clone(), responder);

    match policy {
        Launch::Sync => resolver(request, executor),
        Launch::Async => app.pool().emplace(move || resolver(request, executor)),
    }
}

/// Scheme part of a request URI, the text before the first `:`.
pub fn scheme_of(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    (!scheme.is_empty()).then_some(scheme)
}

/// Whether `name` is a valid scheme token: an ASCII letter followed by letters, digits, `+`, `-`
/// or `.`.
pub fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Table of scheme names declared ahead of webview creation.
#[derive(Debug, Default)]
pub struct SchemeRegistry {
    names: BTreeSet<String>,
    sealed: bool,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`. Returns `false` for duplicates, invalid names and once the table is sealed.
    pub fn register(&mut self, name: &str) -> bool {
        if !valid_name(name) {
            log::warn!("refusing to register invalid scheme name {name:?}");
            return false;
        }

        if self.sealed {
            log::warn!("scheme {name:?} registered after the first webview was created, ignoring");
            return false;
        }

        self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Freeze the table, adding the built-in scheme. Returns the declared names.
    pub fn seal(&mut self) -> Vec<String> {
        if !self.sealed {
            self.names.insert(BUILTIN_SCHEME.to_string());
            self.sealed = true;
        }
        self.names.iter().cloned().collect()
    }
}

lazy_static! {
    static ref REGISTRY: Mutex<SchemeRegistry> = Mutex::new(SchemeRegistry::new());
}

/// Declare a custom scheme for every webview of this process. Must happen before the first webview
/// is created. Returns whether the name was added.
pub fn register(name: &str) -> bool {
    lock(&REGISTRY).register(name)
}

/// Whether `name` was declared.
pub fn registered(name: &str) -> bool {
    lock(&REGISTRY).contains(name)
}

pub(crate) fn seal() -> Vec<String> {
    lock(&REGISTRY).seal()
}
