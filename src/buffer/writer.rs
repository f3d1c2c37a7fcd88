use crate::transport::TransportError;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The medium a buffered sink writes its joined batches to.
pub trait BatchWriter: Send + Sync + fmt::Debug {
    fn write_batch(&self, batch: String) -> Result<(), TransportError>;
}

/// Writes batches to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutWriter;

impl BatchWriter for StdoutWriter {
    fn write_batch(&self, batch: String) -> Result<(), TransportError> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(batch.as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        Ok(())
    }
}

struct AppendRequest {
    path: PathBuf,
    batch: String,
}

/// Appends batches to a file from a single background task.
///
/// Batches travel over an unbounded channel, so callers never wait on
/// disk and appends land in the order they were submitted.
pub struct FileAppender {
    path: RwLock<PathBuf>,
    tx: Mutex<Option<mpsc::UnboundedSender<AppendRequest>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for FileAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAppender")
            .field("path", &*self.path.read())
            .finish_non_exhaustive()
    }
}

impl FileAppender {
    /// Spawn the appender task on the current tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let handle = Handle::try_current().map_err(|_| {
            TransportError::Configuration(
                "file appender must be created inside a tokio runtime".to_string(),
            )
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = handle.spawn(run_appender(rx));

        Ok(Self {
            path: RwLock::new(path.into()),
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.path.read().clone()
    }

    /// Later batches go to `path`; batches already queued keep their target.
    pub fn set_path(&self, path: impl Into<PathBuf>) {
        *self.path.write() = path.into();
    }

    /// Stop accepting batches; queued ones are still written.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Close and wait until every queued batch has been written.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "File appender task ended abnormally");
            }
        }
    }
}

impl BatchWriter for FileAppender {
    fn write_batch(&self, batch: String) -> Result<(), TransportError> {
        let request = AppendRequest {
            path: self.path(),
            batch,
        };

        self.tx
            .lock()
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(request)
            .map_err(|_| TransportError::Closed)
    }
}

async fn run_appender(mut rx: mpsc::UnboundedReceiver<AppendRequest>) {
    while let Some(request) = rx.recv().await {
        match append(&request.path, &request.batch).await {
            Ok(()) => debug!(
                path = %request.path.display(),
                bytes = request.batch.len(),
                "Appended batch"
            ),
            Err(e) => warn!(
                path = %request.path.display(),
                error = %e,
                "Failed to append batch"
            ),
        }
    }
}

async fn append(path: &Path, batch: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(batch.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await
}
