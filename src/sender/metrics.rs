use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the datagram counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatagramMetrics {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}

/// Counters shared between a datagram transport and its send tasks.
#[derive(Debug, Clone, Default)]
pub struct DatagramStats {
    messages_sent: Arc<AtomicU64>,
    messages_dropped: Arc<AtomicU64>,
    chunks_sent: Arc<AtomicU64>,
    bytes_sent: Arc<AtomicU64>,
    send_failures: Arc<AtomicU64>,
}

impl DatagramStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A message whose every datagram was handed to the socket.
    pub fn record_message(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A message that was never sent (no address, too large, closed).
    pub fn record_drop(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_datagram(&self, bytes: usize) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DatagramMetrics {
        DatagramMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.messages_sent.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.chunks_sent.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
    }
}
