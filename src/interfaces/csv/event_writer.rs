use crate::domain::event::OrderEvent;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct EventRecord<'a> {
    order_id: &'a str,
    event: &'a str,
    detail: &'a str,
}

/// Writes order events as CSV records (`order_id,event,detail`).
///
/// Each record is flushed immediately so a terminal can follow an order live.
pub struct EventWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> EventWriter<W> {
    /// Creates a new `EventWriter`; the header row is written with the first record.
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new().has_headers(true).from_writer(sink);
        Self { writer }
    }

    pub fn write_event(&mut self, event: &OrderEvent) -> Result<()> {
        self.writer.serialize(EventRecord {
            order_id: event.order_id.as_str(),
            event: event.kind.as_str(),
            detail: &event.detail,
        })?;
        self.writer.flush()?;
        Ok(())
    }
}
