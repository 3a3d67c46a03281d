//! JSON output to stdout.
//!
//! Every command prints exactly one JSON document (or one per line for
//! streamed ingestion), so logs on stderr never interleave with results.

use std::io::{self, Write};

use serde::Serialize;

/// Writes command results as JSON.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pretty: bool,
}

impl Output {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Print one JSON document to stdout.
    pub fn emit<T: Serialize>(&self, item: &T) -> anyhow::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.write_to(&mut lock, item)?;
        lock.flush()?;
        Ok(())
    }

    /// Print one compact JSON document per line, regardless of `--pretty`.
    pub fn emit_line<T: Serialize>(&self, item: &T) -> anyhow::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        serde_json::to_writer(&mut lock, item)?;
        writeln!(lock)?;
        Ok(())
    }

    fn write_to<W: Write, T: Serialize>(&self, writer: &mut W, item: &T) -> anyhow::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, item)?;
        } else {
            serde_json::to_writer(&mut *writer, item)?;
        }
        writeln!(writer)?;
        Ok(())
    }
}
