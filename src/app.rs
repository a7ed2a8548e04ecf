// src/app.rs
//! UI-thread ownership: [`Application`], [`Launch`] and the dispatch primitives.
//!
//! The thread that creates the [`Application`] becomes the UI thread. Every native call and every
//! user callback runs there. Other threads hand work over with [`Application::post`] (fire and
//! forget), [`Application::dispatch`] (block until the result is back) or
//! [`Application::dispatch_async`] (a future).
//!
//! Tasks posted from one thread run in the order they were posted. There is no global order
//! between different posting threads.

mod dispatch;
mod pool;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};

use crate::config::AppOptions;
use crate::errors::AppError;
use crate::sync::lock;

pub use dispatch::Dispatched;
pub use pool::Pool;

/// A unit of work for the UI thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a handler runs: inline on the thread that received it, or on the worker pool.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Launch {
    #[default]
    Sync,
    Async,
}

/// Handle to the process-wide UI loop. Cheap to clone.
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppInner>,
}

struct AppInner {
    id: String,
    /// Thread that owns the loop
    thread: ThreadId,
    tx: mpsc::UnboundedSender<Task>,
    /// Taken on shutdown; only ever touched on the UI thread
    rx: Mutex<Option<mpsc::UnboundedReceiver<Task>>>,
    should_quit: AtomicBool,
    pool: Pool,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.inner.id)
            .field("thread", &self.inner.thread)
            .field("threads", &self.inner.pool.threads())
            .finish()
    }
}

impl Application {
    /// Create the application. The calling thread becomes the UI thread.
    pub fn new(options: AppOptions) -> Result<Self, AppError> {
        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let pool = Pool::new(options.threads)?;

        log::debug!("application {} owns thread {:?}", options.id, thread::current().id());

        Ok(Self {
            inner: Arc::new(AppInner {
                id: options.id,
                thread: thread::current().id(),
                tx,
                rx: Mutex::new(Some(rx)),
                should_quit: AtomicBool::new(false),
                pool,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Whether the calling thread is the UI thread.
    pub fn thread_safe(&self) -> bool {
        thread::current().id() == self.inner.thread
    }

    /// Worker pool for `Launch::Async` work.
    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    /// Queue a task on the UI thread. Returns `false` once the loop has been shut down.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let queued = self.inner.tx.send(Box::new(task)).is_ok();
        if !queued {
            log::trace!("dropping task posted after shutdown");
        }
        queued
    }

    /// Run `f` on the UI thread and wait for its result.
    ///
    /// On the UI thread itself `f` runs inline. From any other thread the caller blocks until the
    /// loop got to it; a panic inside `f` is resumed here. If the loop is not being pumped the
    /// call does not return: apply a timeout through [`dispatch_async`](Self::dispatch_async)
    /// where latency matters.
    pub fn dispatch<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.thread_safe() {
            return Ok(f());
        }

        self.dispatch_async(f).wait()
    }

    /// Queue `f` on the UI thread and return a future for its result. Never runs inline.
    pub fn dispatch_async<T, F>(&self, f: F) -> Dispatched<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        self.post(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            let _ = tx.send(result);
        });

        Dispatched::new(rx, self.clone())
    }

    /// Pump the loop until [`quit`](Self::quit) is called.
    ///
    /// A quit requested while nobody is pumping stops the next `run` right away.
    pub fn run(&self) {
        if !self.ensure_ui_thread("run") {
            return;
        }

        while !self.inner.should_quit.load(Ordering::Acquire) {
            let task = {
                let mut rx = lock(&self.inner.rx);
                match rx.as_mut() {
                    Some(rx) => rx.blocking_recv(),
                    None => None,
                }
            };

            match task {
                Some(task) => task(),
                None => break,
            }
        }

        self.inner.should_quit.store(false, Ordering::Release);
    }

    /// Run everything that is queued, including tasks posted while draining, without blocking.
    /// Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        if !self.ensure_ui_thread("run_pending") {
            return 0;
        }

        let mut count = 0;

        loop {
            let task = {
                let mut rx = lock(&self.inner.rx);
                rx.as_mut().and_then(|rx| rx.try_recv().ok())
            };

            let Some(task) = task else {
                break;
            };

            task();
            count += 1;
        }

        count
    }

    /// Ask the loop to stop. Callable from any thread.
    pub fn quit(&self) {
        self.inner.should_quit.store(true, Ordering::Release);
        // Wake a loop that is parked waiting for work
        self.post(|| {});
    }

    /// Tear the loop down. Queued tasks are dropped, blocked dispatchers get
    /// [`AppError::LoopClosed`] and later posts are refused.
    pub fn shutdown(&self) {
        if !self.ensure_ui_thread("shutdown") {
            return;
        }

        let rx = lock(&self.inner.rx).take();
        if let Some(mut rx) = rx {
            rx.close();
            let mut dropped = 0;
            while rx.try_recv().is_ok() {
                dropped += 1;
            }
            log::debug!("application {} shut down, {} queued task(s) dropped", self.inner.id, dropped);
        }
    }

    fn ensure_ui_thread(&self, what: &str) -> bool {
        if self.thread_safe() {
            return true;
        }

        log::warn!("{what}() must be called on the UI thread, ignoring");
        false
    }
}
