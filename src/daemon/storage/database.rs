use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::{TrackerError, TrackerResult};

use super::migrations::run_migrations;

type StorageTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(StorageTask),
    Stop,
}

struct StorageThread {
    requests: mpsc::Sender<Request>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StorageThread {
    fn drop(&mut self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.requests.send(Request::Stop).is_err() {
            debug!("Storage thread already stopped");
        }
        if handle.join().is_err() {
            error!("Storage thread panicked while stopping");
        }
    }
}

/// Handle to the screentime database.
///
/// One thread owns the SQLite connection and runs submitted closures in order, so a closure
/// never sees another one half done. Clones share that thread; it stops with the last clone.
#[derive(Clone)]
pub struct Database {
    thread: Arc<StorageThread>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens the database at `path`, creating it and its directory when missing, and migrates
    /// the schema.
    pub fn open(path: PathBuf) -> TrackerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (requests, inbox) = mpsc::channel::<Request>();
        let (ready, opened) = mpsc::channel::<TrackerResult<()>>();
        let thread_path = path.clone();

        let handle = thread::Builder::new()
            .name("screentime-db".into())
            .spawn(move || {
                match prepare_connection(&thread_path) {
                    Ok(conn) => {
                        if ready.send(Ok(())).is_ok() {
                            serve_requests(conn, inbox);
                        }
                    }
                    Err(e) => {
                        let _ = ready.send(Err(e));
                    }
                }
            })?;

        opened
            .recv()
            .map_err(|_| TrackerError::Worker("storage thread died while opening".into()))??;
        info!("Opened database {}", path.display());

        Ok(Self {
            thread: Arc::new(StorageThread {
                requests,
                handle: Mutex::new(Some(handle)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the storage thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> TrackerResult<T>
    where
        F: FnOnce(&mut Connection) -> TrackerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();

        let request = Request::Run(Box::new(move |conn| {
            if reply.send(task(conn)).is_err() {
                debug!("Storage result dropped, caller went away");
            }
        }));

        self.thread
            .requests
            .send(request)
            .map_err(|_| TrackerError::Worker("storage thread stopped".into()))?;

        result
            .await
            .map_err(|_| TrackerError::Worker("storage task aborted".into()))?
    }
}

fn prepare_connection(path: &Path) -> TrackerResult<Connection> {
    let mut conn = Connection::open(path)?;
    let journal: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("Journal mode {journal}");
    conn.pragma_update(None, "foreign_keys", "ON")?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

fn serve_requests(mut conn: Connection, inbox: mpsc::Receiver<Request>) {
    while let Ok(request) = inbox.recv() {
        match request {
            // A panicking task drops its reply sender, which fails only that caller.
            Request::Run(task) => {
                if catch_unwind(AssertUnwindSafe(|| task(&mut conn))).is_err() {
                    error!("Storage task panicked");
                }
            }
            Request::Stop => break,
        }
    }
    debug!("Storage thread stopped");
}
