//! SQLite-backed persistence.
//!
//! One worker thread owns the connection. Every call ships a closure over a
//! channel and waits for its reply, so store operations never interleave on
//! the connection. A single call is atomic relative to others; anything that
//! must be transactional is expressed inside one closure.

mod analysis;
mod filter;
mod images;
mod schema;
mod settings;
mod sky;

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{Result, SkylogError};

pub use filter::{Facet, ImageFilter};
pub use images::SessionSummary;
pub use settings::{DARK_VALIDITY_KEY, FOLDERS_KEY};
pub use sky::SkySample;

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

enum StoreCommand {
    Run(Job),
    Shutdown,
}

/// Joins the worker when the last `Store` clone goes away.
struct WorkerHandle {
    tx: mpsc::Sender<StoreCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(StoreCommand::Shutdown);
        if let Ok(mut slot) = self.thread.lock() {
            if let Some(handle) = slot.take() {
                if handle.join().is_err() {
                    warn!("store worker panicked");
                }
            }
        }
    }
}

/// Handle to the serialized store. Cheap to clone; clones share the worker.
#[derive(Clone)]
pub struct Store {
    tx: mpsc::Sender<StoreCommand>,
    _worker: Arc<WorkerHandle>,
}

impl Store {
    /// Open (creating if needed) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path = path.to_path_buf();
        Self::spawn(move || Connection::open(path))
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::spawn(Connection::open_in_memory)
    }

    /// `<data_dir>/skylog/skylog.sqlite`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skylog")
            .join("skylog.sqlite")
    }

    fn spawn<F>(connect: F) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let thread = std::thread::Builder::new()
            .name("skylog-store".into())
            .spawn(move || {
                let mut conn = match connect().map_err(SkylogError::from).and_then(|mut c| {
                    schema::initialize(&mut c)?;
                    Ok(c)
                }) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                worker_loop(&mut conn, rx);
            })?;

        ready_rx.recv().map_err(|_| SkylogError::StoreClosed)??;
        debug!("store worker started");

        Ok(Self {
            tx: tx.clone(),
            _worker: Arc::new(WorkerHandle {
                tx,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Run `f` on the worker thread and wait for its result.
    pub fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move |conn| {
            let _ = reply_tx.send(f(conn));
        });
        self.tx
            .send(StoreCommand::Run(job))
            .map_err(|_| SkylogError::StoreClosed)?;
        reply_rx.recv().map_err(|_| SkylogError::StoreClosed)?
    }
}

fn worker_loop(conn: &mut Connection, rx: mpsc::Receiver<StoreCommand>) {
    for command in rx {
        match command {
            StoreCommand::Run(job) => job(conn),
            StoreCommand::Shutdown => break,
        }
    }
    debug!("store worker stopped");
}
