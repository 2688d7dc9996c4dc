//! Page framing for the container format (C1/C2, spec §4.1/§4.2).
//!
//! The layout mirrors a widely implemented streaming audio container: an
//! 8-byte signature, a flags byte, a 64-bit granule (sample position), a
//! stream serial number, a page sequence index, a zeroed-then-patched CRC-32,
//! a per-segment size table, and the payload bytes those segments describe.
//! There is no existing crate for this in the dependency pack, so it is
//! hand-rolled directly from the spec's byte-level description.

use crate::error::ContainerError;

/// 8-byte page signature. Not a real-world magic number — this format is
/// private to this crate.
pub const SIGNATURE: [u8; 8] = *b"CSCRPAGE";

pub const FLAG_FIRST_PAGE: u8 = 0b001;
pub const FLAG_LAST_PAGE: u8 = 0b010;
pub const FLAG_CONTINUED: u8 = 0b100;

const ALL_FLAGS: u8 = FLAG_FIRST_PAGE | FLAG_LAST_PAGE | FLAG_CONTINUED;

/// Max bytes a single lacing entry describes, matching the one-byte table
/// entries: a payload longer than 255 bytes is described by a chain of
/// 255-valued entries followed by a final entry `< 255` (the same lacing
/// scheme popularized by Ogg).
const MAX_LACE: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub flags: u8,
    pub granule: u64,
    pub serial: u32,
    pub sequence: u32,
    pub checksum: u32,
}

impl PageHeader {
    pub fn is_first_page(&self) -> bool {
        self.flags & FLAG_FIRST_PAGE != 0
    }

    pub fn is_last_page(&self) -> bool {
        self.flags & FLAG_LAST_PAGE != 0
    }
}

/// Builds the segment-size lacing table describing `payload_len` bytes.
pub fn lacing_table(payload_len: usize) -> Vec<u8> {
    let mut table = Vec::with_capacity(payload_len / MAX_LACE + 1);
    let mut remaining = payload_len;
    while remaining >= MAX_LACE {
        table.push(MAX_LACE as u8);
        remaining -= MAX_LACE;
    }
    table.push(remaining as u8);
    table
}

/// Encodes one full page (header + lacing table + payload) with a correct
/// CRC-32, appending it to `out`.
pub fn encode_page(out: &mut Vec<u8>, flags: u8, granule: u64, serial: u32, sequence: u32, payload: &[u8]) {
    let lacing = lacing_table(payload.len());

    let start = out.len();
    out.extend_from_slice(&SIGNATURE);
    out.push(flags);
    out.extend_from_slice(&granule.to_be_bytes());
    out.extend_from_slice(&serial.to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    let checksum_at = out.len();
    out.extend_from_slice(&0u32.to_be_bytes());
    out.push(lacing.len() as u8);
    out.extend_from_slice(&lacing);
    out.extend_from_slice(payload);

    let crc = crc32(&out[start..]);
    out[checksum_at..checksum_at + 4].copy_from_slice(&crc.to_be_bytes());
}

/// Fixed portion of the header preceding the checksum field, used to size
/// reads before the lacing table length is known.
pub const HEADER_PREFIX_LEN: usize = SIGNATURE.len() + 1 + 8 + 4 + 4;
/// `HEADER_PREFIX_LEN` plus the checksum field and the segment-count byte.
pub const HEADER_FIXED_LEN: usize = HEADER_PREFIX_LEN + 4 + 1;

/// Parses the fixed-size header (everything up to and including the
/// segment-count byte) out of `buf`, which must be exactly `HEADER_FIXED_LEN`
/// bytes.
pub fn decode_header_fixed(buf: &[u8]) -> Result<(PageHeader, u8), ContainerError> {
    debug_assert_eq!(buf.len(), HEADER_FIXED_LEN);

    if buf[..8] != SIGNATURE {
        return Err(ContainerError::BadSignature);
    }
    let flags = buf[8];
    if flags & !ALL_FLAGS != 0 {
        return Err(ContainerError::BadHeaderType);
    }
    let granule = u64::from_be_bytes(buf[9..17].try_into().unwrap());
    let serial = u32::from_be_bytes(buf[17..21].try_into().unwrap());
    let sequence = u32::from_be_bytes(buf[21..25].try_into().unwrap());
    let checksum = u32::from_be_bytes(buf[25..29].try_into().unwrap());
    let segment_count = buf[29];

    Ok((
        PageHeader {
            flags,
            granule,
            serial,
            sequence,
            checksum,
        },
        segment_count,
    ))
}

/// Re-derives the full header bytes (checksum zeroed) for CRC verification,
/// given the already-parsed header, lacing table, and payload.
pub fn header_bytes_for_crc(header: &PageHeader, lacing: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_FIXED_LEN + lacing.len() + payload.len());
    buf.extend_from_slice(&SIGNATURE);
    buf.push(header.flags);
    buf.extend_from_slice(&header.granule.to_be_bytes());
    buf.extend_from_slice(&header.serial.to_be_bytes());
    buf.extend_from_slice(&header.sequence.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes());
    buf.push(lacing.len() as u8);
    buf.extend_from_slice(lacing);
    buf.extend_from_slice(payload);
    buf
}

/// CRC-32 with polynomial 0x04C11DB7, MSB-first, no reflection, initial value
/// 0, no final XOR — the variant used by the format this page layout mirrors.
pub fn crc32(data: &[u8]) -> u32 {
    static TABLE: std::sync::OnceLock<[u32; 256]> = std::sync::OnceLock::new();
    let table = TABLE.get_or_init(build_crc_table);

    let mut crc: u32 = 0;
    for &byte in data {
        let idx = ((crc >> 24) ^ (byte as u32)) & 0xFF;
        crc = (crc << 8) ^ table[idx as usize];
    }
    crc
}

fn build_crc_table() -> [u32; 256] {
    const POLY: u32 = 0x04c1_1db7;
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}
