//! Webview events, usable with [`Webview::on`](crate::webview::Webview::on).

use crate::event::{Event, EventKind, Policy};

/// Runtime tag of a webview event, for `remove`, `clear` and backend subscriptions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WebEvent {
    DomReady,
    Navigated,
    Navigate,
    Favicon,
    Title,
    Load,
}

impl WebEvent {
    /// Events the backend only reports after [`subscribe`](super::WebviewBackend::subscribe).
    pub fn lazy(self) -> bool {
        matches!(self, WebEvent::Navigated | WebEvent::Title | WebEvent::Load)
    }
}

/// A navigation that is about to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: String,
    /// Opened in a new window (`target="_blank"`, `window.open`)
    pub new_window: bool,
    pub redirection: bool,
    pub user_initiated: bool,
}

impl Navigation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            new_window: false,
            redirection: false,
            user_initiated: false,
        }
    }
}

/// Encoded favicon bytes as delivered by the backend. Decoding is up to the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Icon {
    pub data: Vec<u8>,
}

impl Icon {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadState {
    Started,
    Finished,
}

#[derive(Debug, Default)]
pub struct WebEvents {
    pub(crate) dom_ready: Event<()>,
    pub(crate) navigated: Event<String>,
    pub(crate) navigate: Event<Navigation, Policy>,
    pub(crate) favicon: Event<Icon>,
    pub(crate) title: Event<String>,
    pub(crate) load: Event<LoadState>,
}

macro_rules! each_slot {
    ($events:expr, $tag:expr, |$slot:ident| $body:expr) => {
        match $tag {
            WebEvent::DomReady => { let $slot = &$events.dom_ready; $body }
            WebEvent::Navigated => { let $slot = &$events.navigated; $body }
            WebEvent::Navigate => { let $slot = &$events.navigate; $body }
            WebEvent::Favicon => { let $slot = &$events.favicon; $body }
            WebEvent::Title => { let $slot = &$events.title; $body }
            WebEvent::Load => { let $slot = &$events.load; $body }
        }
    };
}

impl WebEvents {
    pub(crate) fn remove(&self, event: WebEvent, id: u64) {
        each_slot!(self, event, |slot| slot.remove(id))
    }

    pub(crate) fn clear(&self, event: WebEvent) {
        each_slot!(self, event, |slot| slot.clear())
    }

    pub(crate) fn is_empty(&self, event: WebEvent) -> bool {
        each_slot!(self, event, |slot| slot.is_empty())
    }

    pub(crate) fn wired(&self, event: WebEvent) -> bool {
        each_slot!(self, event, |slot| slot.wired())
    }

    pub(crate) fn on_clear(&self, event: WebEvent, teardown: impl FnOnce() + Send + 'static) {
        each_slot!(self, event, |slot| slot.on_clear(teardown))
    }

    pub(crate) fn clear_all(&self) {
        for event in [
            WebEvent::DomReady,
            WebEvent::Navigated,
            WebEvent::Navigate,
            WebEvent::Favicon,
            WebEvent::Title,
            WebEvent::Load,
        ] {
            self.clear(event);
        }
    }
}

/// The DOM of the current page has been parsed.
pub struct DomReady;
/// The page committed to a new URL.
pub struct Navigated;
/// A navigation is about to start. Return `Policy::Block` to cancel it.
pub struct Navigate;
pub struct Favicon;
pub struct Title;
pub struct Load;

macro_rules! web_event {
    ($kind:ident, $slot:ident, $args:ty, $output:ty) => {
        impl EventKind for $kind {
            type Manager = WebEvents;
            type Tag = WebEvent;
            type Args = $args;
            type Output = $output;

            const TAG: WebEvent = WebEvent::$kind;

            fn slot(manager: &WebEvents) -> &Event<$args, $output> {
                &manager.$slot
            }
        }
    };
}

web_event!(DomReady, dom_ready, (), ());
web_event!(Navigated, navigated, String, ());
web_event!(Navigate, navigate, Navigation, Policy);
web_event!(Favicon, favicon, Icon, ());
web_event!(Title, title, String, ());
web_event!(Load, load, LoadState, ());
