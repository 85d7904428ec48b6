use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error};

use crate::error::{Result, SkylogError};

/// Bounded worker pool with typed submission and a graceful shutdown that
/// waits for every accepted task.
pub struct TaskQueue {
    pool: ThreadPool,
    in_flight: Arc<InFlight>,
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        if let Ok(mut count) = self.count.lock() {
            *count += 1;
        }
        InFlightGuard(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let Ok(mut count) = self.count.lock() else {
            return;
        };
        while *count > 0 {
            match self.idle.wait(count) {
                Ok(guard) => count = guard,
                Err(_) => return,
            }
        }
    }
}

/// Decrements the in-flight count even if the task panics.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut count) = self.0.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.0.idle.notify_all();
            }
        }
    }
}

/// Result of one submitted task.
pub struct Ticket<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Ticket<T> {
    /// Block until the task finishes.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| SkylogError::Pool("task panicked before producing a result".into()))
    }
}

/// Results of a batch, yielded in completion order (not submission order).
pub struct Completions<T> {
    rx: mpsc::Receiver<T>,
    total: usize,
}

impl<T> Completions<T> {
    /// Number of tasks submitted.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl<T> Iterator for Completions<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

impl TaskQueue {
    /// `workers == 0` uses the available parallelism.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            workers
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("skylog-reader-{i}"))
            .panic_handler(|_| error!("reader task panicked"))
            .build()
            .map_err(|e| SkylogError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn submit<T, F>(&self, job: F) -> Ticket<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let guard = self.in_flight.enter();
        self.pool.spawn(move || {
            let _guard = guard;
            let _ = tx.send(job());
        });
        Ticket { rx }
    }

    /// Run `job` once per item. Every item yields exactly one result unless
    /// its task panics.
    pub fn submit_all<I, T, F>(&self, items: I, job: F) -> Completions<T>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        T: Send + 'static,
        F: Fn(I::Item) -> T + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job = Arc::new(job);
        let mut total = 0;
        for item in items {
            let tx = tx.clone();
            let job = Arc::clone(&job);
            let guard = self.in_flight.enter();
            self.pool.spawn(move || {
                let _guard = guard;
                let _ = tx.send(job(item));
            });
            total += 1;
        }
        Completions { rx, total }
    }

    /// Wait for every accepted task, then release the pool.
    pub fn shutdown(self) {
        self.in_flight.wait_idle();
        debug!("task queue drained");
    }
}
