//! Application and webview configuration.
//!
//! [`AppOptions`] configures the process-wide [`Application`](crate::app::Application): its
//! identifier and the size of the worker pool that runs `Launch::Async` handlers.
//! [`Preferences`] is handed to a webview backend when it is attached and controls the browser
//! process the backend spins up.
//!
//! Both provide defaults via [`Default`] and a fluent builder with validation.
//!
//! ```rust
//! use saucer::config::{AppOptions, Preferences};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = AppOptions::builder().id("org.example.app").threads(2).build()?;
//! assert_eq!(options.threads, 2);
//!
//! let prefs = Preferences::builder()
//!     .user_agent("Example/1.0")
//!     .hardware_acceleration(false)
//!     .browser_flag("--enable-logging")
//!     .build();
//! assert!(prefs.browser_flags.contains("--enable-logging"));
//! # Ok(()) }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_APP_ID: &str = "app.saucer.default";

#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Application identifier (reverse-DNS style), used by backends that need one.
    pub id: String,
    /// Number of worker threads for asynchronous scheme resolvers and exposed functions.
    pub threads: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);

        Self {
            id: DEFAULT_APP_ID.to_string(),
            threads,
        }
    }
}

impl AppOptions {
    pub fn builder() -> AppOptionsBuilder {
        AppOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppOptionsBuilder {
    inner: AppOptions,
}

impl AppOptionsBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut AppOptions)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn id<S: Into<String>>(self, id: S) -> Self { self.map(|c| c.id = id.into()) }
    pub fn threads(self, n: usize) -> Self { self.map(|c| c.threads = n) }

    /// Validate and build the final options.
    pub fn build(self) -> Result<AppOptions, OptionsError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

/// Browser preferences a backend applies when it creates its rendering surface.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub user_agent: Option<String>,
    /// Keep cookies and storage between runs. Without a `storage_path` backends pick a default.
    pub persistent_cookies: bool,
    pub storage_path: Option<PathBuf>,
    pub hardware_acceleration: bool,
    /// Extra command line flags for the browser process.
    pub browser_flags: BTreeSet<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_agent: None,
            persistent_cookies: true,
            storage_path: None,
            hardware_acceleration: true,
            browser_flags: BTreeSet::new(),
        }
    }
}

impl Preferences {
    pub fn builder() -> PreferencesBuilder {
        PreferencesBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreferencesBuilder {
    inner: Preferences,
}

impl PreferencesBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut Preferences)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = Some(ua.into())) }
    pub fn persistent_cookies(self, on: bool) -> Self { self.map(|c| c.persistent_cookies = on) }
    pub fn storage_path<P: Into<PathBuf>>(self, path: P) -> Self { self.map(|c| c.storage_path = Some(path.into())) }
    pub fn hardware_acceleration(self, on: bool) -> Self { self.map(|c| c.hardware_acceleration = on) }
    pub fn browser_flag<S: Into<String>>(self, flag: S) -> Self { self.map(|c| { c.browser_flags.insert(flag.into()); }) }

    pub fn build(self) -> Preferences {
        self.inner
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum OptionsError {
    EmptyId,
    InvalidId(String),
    ZeroThreads,
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::EmptyId => write!(f, "application id must not be empty"),
            OptionsError::InvalidId(id) => write!(f, "application id {id:?} contains whitespace"),
            OptionsError::ZeroThreads => write!(f, "worker pool needs at least one thread"),
        }
    }
}
impl std::error::Error for OptionsError {}

fn validate(c: &AppOptions) -> Result<(), OptionsError> {
    if c.id.is_empty() {
        return Err(OptionsError::EmptyId);
    }
    if c.id.chars().any(char::is_whitespace) {
        return Err(OptionsError::InvalidId(c.id.clone()));
    }
    if c.threads == 0 {
        return Err(OptionsError::ZeroThreads);
    }
    Ok(())
}
