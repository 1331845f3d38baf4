//! Destinations for serialized server log lines.
use std::io::{self, Write};

/// A destination accepting one complete record per line.
pub trait LogSink: Send + Sync {
    /// Writes a single line. `line` carries no trailing newline.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Writes each record to stdout so it can be piped into a collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()
    }
}

/// Keeps lines in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Every line parsed back into a JSON value.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("sink line is JSON"))
            .collect()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}
