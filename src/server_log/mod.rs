//! Server-side structured logging.
//!
//! Each simulated request handler writes `ServerLogEntry` records through a
//! `ServerLogger`, one JSON object per line.
pub mod entry;
pub mod logger;
pub mod sink;

pub use entry::{ServerLogEntry, ServerLogFields};
pub use logger::{ServerLogger, DEFAULT_SERVICE};
pub use sink::{LogSink, StdoutSink};

#[cfg(test)]
pub use sink::MemorySink;
