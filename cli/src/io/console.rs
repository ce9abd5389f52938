//! Terminal output sink and process termination.
//!
//! Actions never print through `println!` directly: they write through a
//! [`Console`] so tests can capture what the user would have seen, and they end
//! the process through a [`ProcessExit`] so tests can observe the exit code.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};

/// Shared, line-oriented writer for user-facing output.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write `line` followed by a newline and flush.
    pub fn print_line(&self, line: &str) -> Result<()> {
        let mut out = self.lock()?;
        writeln!(out, "{line}").context("write to terminal")?;
        out.flush().context("flush terminal")
    }

    /// Forward raw bytes (e.g. a log stream) and flush.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut out = self.lock()?;
        out.write_all(bytes).context("write to terminal")?;
        out.flush().context("flush terminal")
    }

    pub fn flush(&self) -> Result<()> {
        self.lock()?.flush().context("flush terminal")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn Write + Send>>> {
        self.out.lock().map_err(|_| anyhow!("terminal writer lock poisoned"))
    }
}

/// Ends the process. Implementations must not return.
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32) -> !;
}

/// Exits the real process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExit;

impl ProcessExit for SystemExit {
    fn exit(&self, code: i32) -> ! {
        let _ = io::stdout().flush();
        std::process::exit(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SharedBuffer;

    #[test]
    fn print_line_appends_newline() {
        let buffer = SharedBuffer::default();
        let console = Console::from_writer(buffer.clone());
        console.print_line("hello").expect("print");
        console.write_bytes(b"raw").expect("write");
        assert_eq!(buffer.text(), "hello\nraw");
    }
}
