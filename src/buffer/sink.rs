use super::writer::BatchWriter;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Largest number of entries a single flush carries.
    pub buffer_size: usize,
    /// Longest time an entry waits in the queue.
    pub write_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            write_timeout: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    SizeBased,
    TimeBased,
    Explicit,
}

/// Queue of serialized entries written to a medium in bulk.
///
/// An accumulation cycle ends with exactly one flush: either the queue is
/// full when another entry arrives (flushed synchronously, inside `write`)
/// or the timer armed by the cycle's first entry fires. Each flush cancels
/// the pending timer, and a timer that already fired but lost the race to
/// the lock is recognised by its stale generation and does nothing.
#[derive(Clone, Debug)]
pub struct BufferedSink {
    inner: Arc<BufferInner>,
}

#[derive(Debug)]
struct BufferInner {
    state: Mutex<BufferState>,
    config: RwLock<BufferConfig>,
    writer: Arc<dyn BatchWriter>,
    flushes: AtomicU64,
}

#[derive(Debug, Default)]
struct BufferState {
    queue: Vec<String>,
    timer: Option<AbortHandle>,
    generation: u64,
    closed: bool,
}

impl BufferedSink {
    pub fn new(writer: Arc<dyn BatchWriter>, config: BufferConfig) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                state: Mutex::new(BufferState::default()),
                config: RwLock::new(config),
                writer,
                flushes: AtomicU64::new(0),
            }),
        }
    }

    pub fn write(&self, entry: String) {
        let config = *self.inner.config.read();
        let mut state = self.inner.state.lock();

        if state.closed {
            debug!("Dropping entry written to a closed buffer");
            return;
        }

        if !state.queue.is_empty() && state.queue.len() >= config.buffer_size {
            self.inner.flush_locked(&mut state, FlushTrigger::SizeBased);
        }

        state.queue.push(entry);

        if state.timer.is_none() {
            self.schedule_timer(&mut state, config.write_timeout);
        }
    }

    pub fn flush(&self) {
        let mut state = self.inner.state.lock();
        self.inner.flush_locked(&mut state, FlushTrigger::Explicit);
    }

    /// Flush what is pending and refuse further entries.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        self.inner.flush_locked(&mut state, FlushTrigger::Explicit);
        state.closed = true;
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> BufferConfig {
        *self.inner.config.read()
    }

    /// Takes effect from the next write; an armed timer keeps its deadline.
    pub fn set_config(&self, config: BufferConfig) {
        *self.inner.config.write() = config;
    }

    fn schedule_timer(&self, state: &mut BufferState, timeout: Duration) {
        let Ok(handle) = Handle::try_current() else {
            // Nothing can fire later without a runtime
            self.inner.flush_locked(state, FlushTrigger::Explicit);
            return;
        };

        state.generation += 1;
        let generation = state.generation;
        let inner: Weak<BufferInner> = Arc::downgrade(&self.inner);

        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = inner.upgrade() {
                inner.fire_timer(generation);
            }
        });

        state.timer = Some(task.abort_handle());
    }
}

impl BufferInner {
    fn fire_timer(&self, generation: u64) {
        let mut state = self.state.lock();

        if state.generation != generation || state.timer.is_none() {
            return;
        }

        // Clear rather than abort: this is the running timer task
        state.timer = None;
        self.flush_locked(&mut state, FlushTrigger::TimeBased);
    }

    fn flush_locked(&self, state: &mut BufferState, trigger: FlushTrigger) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;

        if state.queue.is_empty() {
            return;
        }

        let entries = std::mem::take(&mut state.queue);
        let count = entries.len();
        self.flushes.fetch_add(1, Ordering::Relaxed);

        debug!(count, ?trigger, "Flushing buffered entries");

        if let Err(e) = self.writer.write_batch(entries.join("\n")) {
            warn!(count, error = %e, "Failed to write buffered entries");
        }
    }
}
