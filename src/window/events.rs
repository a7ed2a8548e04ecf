//! Window events, usable with [`Window::on`](crate::window::Window::on).

use crate::event::{Event, EventKind, Policy};
use crate::window::Size;

/// Runtime tag of a window event, for `remove` and `clear`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowEvent {
    Close,
    Closed,
    Resize,
    Focus,
}

#[derive(Debug, Default)]
pub struct WindowEvents {
    pub(crate) close: Event<(), Policy>,
    pub(crate) closed: Event<()>,
    pub(crate) resize: Event<Size>,
    pub(crate) focus: Event<bool>,
}

impl WindowEvents {
    pub(crate) fn remove(&self, event: WindowEvent, id: u64) {
        match event {
            WindowEvent::Close => self.close.remove(id),
            WindowEvent::Closed => self.closed.remove(id),
            WindowEvent::Resize => self.resize.remove(id),
            WindowEvent::Focus => self.focus.remove(id),
        }
    }

    pub(crate) fn clear(&self, event: WindowEvent) {
        match event {
            WindowEvent::Close => self.close.clear(),
            WindowEvent::Closed => self.closed.clear(),
            WindowEvent::Resize => self.resize.clear(),
            WindowEvent::Focus => self.focus.clear(),
        }
    }

    pub(crate) fn clear_all(&self) {
        self.close.clear();
        self.closed.clear();
        self.resize.clear();
        self.focus.clear();
    }
}

/// Close was requested. Return `Policy::Block` to keep the window open.
pub struct Close;
/// The window is gone.
pub struct Closed;
pub struct Resize;
pub struct Focus;

macro_rules! window_event {
    ($kind:ident, $slot:ident, $args:ty, $output:ty) => {
        impl EventKind for $kind {
            type Manager = WindowEvents;
            type Tag = WindowEvent;
            type Args = $args;
            type Output = $output;

            const TAG: WindowEvent = WindowEvent::$kind;

            fn slot(manager: &WindowEvents) -> &Event<$args, $output> {
                &manager.$slot
            }
        }
    };
}

window_event!(Close, close, (), Policy);
window_event!(Closed, closed, (), ());
window_event!(Resize, resize, Size, ());
window_event!(Focus, focus, bool, ());
