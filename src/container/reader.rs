//! Container reader (C2, spec §4.2).

use std::io::Read;

use crate::container::page::{HEADER_FIXED_LEN, PageHeader, crc32, decode_header_fixed, header_bytes_for_crc};
use crate::error::ContainerError;

/// Parses the container back into `(payload, header)` pairs with optional
/// checksum verification. Supports `reset` so a caller can splice a new
/// underlying stream in mid-parse (used by live readers tailing a file still
/// being written).
pub struct ContainerReader<R> {
    inner: R,
    bytes_read: u64,
    verify_checksum: bool,
}

impl<R: Read> ContainerReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
            verify_checksum: true,
        }
    }

    pub fn with_checksum_verification(inner: R, verify_checksum: bool) -> Self {
        Self {
            inner,
            bytes_read: 0,
            verify_checksum,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Swaps the underlying stream, handing the caller the number of bytes
    /// consumed so far so they can reopen the source from that offset.
    pub fn reset<F>(&mut self, f: F)
    where
        F: FnOnce(u64) -> R,
    {
        self.inner = f(self.bytes_read);
    }

    /// Reads the next page. Returns `Ok(None)` cleanly at a page boundary
    /// that coincides with end-of-stream (no more pages follow).
    pub fn parse_next(&mut self) -> Result<Option<(Vec<u8>, PageHeader)>, ContainerError> {
        let mut fixed = [0u8; HEADER_FIXED_LEN];
        match read_exact_or_eof(&mut self.inner, &mut fixed)? {
            FillResult::Eof => return Ok(None),
            FillResult::Short => return Err(ContainerError::ShortPage),
            FillResult::Full => {}
        }
        self.bytes_read += HEADER_FIXED_LEN as u64;

        let (header, segment_count) = decode_header_fixed(&fixed)?;

        let mut lacing = vec![0u8; segment_count as usize];
        read_exact(&mut self.inner, &mut lacing)?;
        self.bytes_read += lacing.len() as u64;

        let payload_len: usize = lacing.iter().map(|&b| b as usize).sum();
        let mut payload = vec![0u8; payload_len];
        read_exact(&mut self.inner, &mut payload)?;
        self.bytes_read += payload.len() as u64;

        if self.verify_checksum {
            let crc_input = header_bytes_for_crc(&header, &lacing, &payload);
            if crc32(&crc_input) != header.checksum {
                return Err(ContainerError::ChecksumMismatch);
            }
        }

        Ok(Some((payload, header)))
    }
}

enum FillResult {
    Full,
    Short,
    Eof,
}

fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<FillResult, ContainerError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r
            .read(&mut buf[filled..])
            .map_err(|_| ContainerError::ShortPage)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled == 0 {
        Ok(FillResult::Eof)
    } else if filled < buf.len() {
        Ok(FillResult::Short)
    } else {
        Ok(FillResult::Full)
    }
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), ContainerError> {
    r.read_exact(buf).map_err(|_| ContainerError::ShortPage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::writer::ContainerWriter;

    #[test]
    fn checksum_mismatch_is_detected() {
        let mut writer = ContainerWriter::new(Vec::new(), 1);
        writer.write(b"payload", 0).unwrap();
        let mut bytes = writer.close().unwrap();

        // Flip a payload byte in the second page without touching its checksum.
        let corrupt_at = bytes.len() - 4;
        bytes[corrupt_at] ^= 0xFF;

        let mut reader = ContainerReader::new(std::io::Cursor::new(bytes));
        reader.parse_next().unwrap(); // metadata page, untouched
        let err = reader.parse_next().unwrap_err();
        assert_eq!(err, ContainerError::ChecksumMismatch);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut reader = ContainerReader::new(std::io::Cursor::new(vec![0u8; HEADER_FIXED_LEN]));
        let err = reader.parse_next().unwrap_err();
        assert_eq!(err, ContainerError::BadSignature);
    }

    #[test]
    fn truncated_page_is_short_page() {
        let mut writer = ContainerWriter::new(Vec::new(), 1);
        writer.write(b"payload", 0).unwrap();
        let bytes = writer.close().unwrap();
        let truncated = &bytes[..bytes.len() - 10];

        let mut reader = ContainerReader::new(std::io::Cursor::new(truncated.to_vec()));
        reader.parse_next().unwrap();
        reader.parse_next().unwrap();
        let err = reader.parse_next().unwrap_err();
        assert_eq!(err, ContainerError::ShortPage);
    }
}
