use std::io::Write;

use crate::Result;
use crate::event::Event;

/// Destination for protocol events.
pub trait EventSink {
    fn emit(&mut self, event: &Event) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// An `EventSink` that writes newline-delimited JSON.
///
/// Each event is written as one line and the writer is flushed immediately, so a parent
/// process reading our stdout through a pipe sees every event as soon as it exists.
pub struct NdjsonWriter<W: Write> {
    w: W,

    /// Once closed, no further writes are allowed.
    closed: bool,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(w: W) -> Self {
        Self { w, closed: false }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write> EventSink for NdjsonWriter<W> {
    fn emit(&mut self, event: &Event) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg("cannot write event: writer is already closed"));
        }

        serde_json::to_writer(&mut self.w, event)?;
        self.w.write_all(b"\n")?;
        self.w.flush()?;
        Ok(())
    }

    /// Flush and refuse further events. Safe to call more than once.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;
        Ok(())
    }
}
