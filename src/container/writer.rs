//! Container writer (C1, spec §4.1).

use std::io::Write;

use crate::container::page::{FLAG_FIRST_PAGE, FLAG_LAST_PAGE, encode_page};
use crate::error::Error;

/// Multiplexes raw compressed audio frames into a seekable container with
/// monotonically increasing sample-position tags, injecting silence gaps.
///
/// Not thread-safe: callers serialize externally (spec §4.1). The first page
/// written is an empty metadata/id page; the writer marks the final page
/// end-of-stream in [`ContainerWriter::close`].
pub struct ContainerWriter<W: Write> {
    w: W,
    serial: u32,
    sequence: u32,
    granule: u64,
    started: bool,
    closed: bool,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(w: W, serial: u32) -> Self {
        Self {
            w,
            serial,
            sequence: 0,
            granule: 0,
            started: false,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<(), Error> {
        if self.started {
            return Ok(());
        }
        let mut page = Vec::new();
        encode_page(&mut page, FLAG_FIRST_PAGE, 0, self.serial, self.sequence, &[]);
        self.w.write_all(&page)?;
        self.sequence += 1;
        self.started = true;
        Ok(())
    }

    /// Emits one logical page carrying `payload`. If `gap_samples > 0`, the
    /// running sample position advances by that amount before the page is
    /// written, producing a hole a reader decodes as silence.
    pub fn write(&mut self, payload: &[u8], gap_samples: u64) -> Result<(), Error> {
        self.start_if_needed()?;
        self.granule = self.granule.saturating_add(gap_samples);

        let mut page = Vec::new();
        encode_page(&mut page, 0, self.granule, self.serial, self.sequence, payload);
        self.w.write_all(&page)?;
        self.sequence += 1;
        Ok(())
    }

    /// Writes the end-of-stream page and returns the underlying writer.
    pub fn close(mut self) -> Result<W, Error> {
        self.start_if_needed()?;
        if !self.closed {
            let mut page = Vec::new();
            encode_page(&mut page, FLAG_LAST_PAGE, self.granule, self.serial, self.sequence, &[]);
            self.w.write_all(&page)?;
            self.w.flush()?;
            self.closed = true;
        }
        Ok(self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::reader::ContainerReader;

    #[test]
    fn write_then_read_round_trips_payloads_and_granule() {
        let mut writer = ContainerWriter::new(Vec::new(), 1);
        writer.write(b"frame-one", 0).unwrap();
        writer.write(b"frame-two", 960).unwrap();
        let bytes = writer.close().unwrap();

        let mut reader = ContainerReader::new(std::io::Cursor::new(bytes));
        let (meta_payload, meta_header) = reader.parse_next().unwrap().unwrap();
        assert!(meta_payload.is_empty());
        assert!(meta_header.is_first_page());

        let (p1, h1) = reader.parse_next().unwrap().unwrap();
        assert_eq!(p1, b"frame-one");
        assert_eq!(h1.granule, 0);

        let (p2, h2) = reader.parse_next().unwrap().unwrap();
        assert_eq!(p2, b"frame-two");
        assert_eq!(h2.granule, 960);

        let (eos_payload, eos_header) = reader.parse_next().unwrap().unwrap();
        assert!(eos_payload.is_empty());
        assert!(eos_header.is_last_page());

        assert!(reader.parse_next().unwrap().is_none());
    }
}
