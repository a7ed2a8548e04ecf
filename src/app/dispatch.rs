use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;

use tokio::sync::oneshot;

use crate::app::Application;
use crate::errors::AppError;

/// Result of [`Application::dispatch_async`].
///
/// Resolves once the UI thread ran the closure. A panic inside the closure is resumed on whoever
/// consumes the result. There is no cancellation: dropping this only discards the result.
pub struct Dispatched<T> {
    rx: oneshot::Receiver<thread::Result<T>>,
    app: Application,
}

impl<T> Dispatched<T> {
    pub(crate) fn new(rx: oneshot::Receiver<thread::Result<T>>, app: Application) -> Self {
        Self { rx, app }
    }

    /// Block the calling thread until the result is available.
    ///
    /// Refuses to block the UI thread itself, which would never get around to running the task.
    /// Must not be called from inside an async context.
    pub fn wait(self) -> Result<T, AppError> {
        if self.app.thread_safe() {
            return Err(AppError::WouldDeadlock);
        }

        settle(self.rx.blocking_recv())
    }
}

impl<T> Future for Dispatched<T> {
    type Output = Result<T, AppError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(settle)
    }
}

fn settle<T>(received: Result<thread::Result<T>, oneshot::error::RecvError>) -> Result<T, AppError> {
    match received {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => panic::resume_unwind(payload),
        // Task was dropped without running: the loop was shut down.
        Err(_) => Err(AppError::LoopClosed),
    }
}
