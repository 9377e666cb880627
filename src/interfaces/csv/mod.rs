mod event_writer;

pub use event_writer::EventWriter;
