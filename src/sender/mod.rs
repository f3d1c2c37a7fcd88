//! Delivery to a remote collector over chunked, compressed UDP datagrams.

pub mod chunking;
pub mod envelope;
pub mod graylog;
pub mod metrics;

pub use chunking::{CHUNK_HEADER_SIZE, CHUNK_MAGIC, ChunkDescriptor, MAX_CHUNKS, plan_datagrams};
pub use envelope::{base_group, severity};
pub use graylog::{AddressState, GraylogSettings, GraylogTransport};
pub use metrics::{DatagramMetrics, DatagramStats};
