//! Console — serialized line output shared by all tasks
//!
//! Host I/O is slow compared with a tick, so tasks print at most one line
//! per cycle. Writes are serialized so lines from different tasks never
//! interleave.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Sink for diagnostic lines
pub trait Console: Send + Sync {
    /// Render and emit one line. Fire-and-forget: output failures are not
    /// reported to the caller.
    fn print(&self, args: fmt::Arguments<'_>);
}

/// Console writing to the process stdout
#[derive(Debug, Default)]
pub struct StdoutConsole {
    lock: Mutex<()>,
}

impl StdoutConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for StdoutConsole {
    fn print(&self, args: fmt::Arguments<'_>) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = io::stdout().lock();
        if let Err(err) = writeln!(out, "{args}").and_then(|()| out.flush()) {
            debug!(error = %err, "console write failed");
        }
    }
}

/// Console that keeps lines in memory
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines printed so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Console for MemoryConsole {
    fn print(&self, args: fmt::Arguments<'_>) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.to_string());
    }
}
