//! Buffered writing shared by the sinks that batch their output.

pub mod sink;
pub mod writer;

pub use sink::{BufferConfig, BufferedSink, FlushTrigger};
pub use writer::{BatchWriter, FileAppender, StdoutWriter};
