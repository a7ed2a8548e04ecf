use tokio::runtime::{Builder, Handle, Runtime};

/// Bounded worker pool for `Launch::Async` handlers.
///
/// Backed by a multi-threaded tokio runtime. Blocking work goes through `spawn_blocking`, capped at
/// the configured thread count. Results never flow back on their own: callers post them onto the
/// UI thread.
pub struct Pool {
    runtime: Option<Runtime>,
    threads: usize,
}

impl Pool {
    pub(crate) fn new(threads: usize) -> std::io::Result<Self> {
        let threads = threads.max(1);

        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .max_blocking_threads(threads)
            .thread_name("saucer-worker")
            .enable_all()
            .build()?;

        Ok(Self {
            runtime: Some(runtime),
            threads,
        })
    }

    /// Number of threads in the pool.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queue a blocking task.
    pub fn emplace<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.runtime {
            Some(runtime) => {
                runtime.spawn_blocking(task);
            }
            None => log::warn!("worker pool is gone, dropping task"),
        }
    }

    /// Handle to the underlying runtime, for callers that want to spawn futures.
    pub fn handle(&self) -> Option<&Handle> {
        self.runtime.as_ref().map(Runtime::handle)
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // The last handle may go away on a pool thread, where a blocking shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
