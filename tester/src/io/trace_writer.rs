//! Incremental JSON array writer for the trace file.
//!
//! The array is opened on construction and closed by [`JsonArrayWriter::finish`];
//! elements are appended in between without rewriting earlier bytes, so the
//! file is valid JSON only once it has been finished.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

pub struct JsonArrayWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Write the opening `[`.
    pub fn begin(mut out: W) -> Result<Self> {
        out.write_all(b"[").context("write opening bracket")?;
        Ok(Self { out, written: 0 })
    }

    /// Append one pretty-printed element, comma-separated from the previous one.
    ///
    /// The element is serialized fully before anything is written, and is
    /// flushed before this returns so a failed write belongs to this element.
    pub fn push<T: Serialize>(&mut self, element: &T) -> Result<()> {
        let mut buf = Vec::new();
        if self.written > 0 {
            buf.push(b',');
        }
        serde_json::to_writer_pretty(&mut buf, element).context("serialize trace entry")?;
        self.out.write_all(&buf).context("write trace entry")?;
        self.out.flush().context("write trace entry")?;
        self.written += 1;
        Ok(())
    }

    /// Number of elements appended so far.
    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Write the closing `]`, flush, and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.write_all(b"]").context("write closing bracket")?;
        self.out.flush().context("flush trace file")?;
        Ok(self.out)
    }
}
