//! Container decoding into timed PCM chunks (C8 step 2a, spec §4.8).

use std::fs::File;
use std::path::Path;

use crate::codec::{DECODE_SAMPLE_RATE_HZ, Decoder};
use crate::container::ContainerReader;
use crate::error::Error;
use crate::track::ingest::{FRAME_SAMPLES_IN, INGEST_SAMPLE_RATE_HZ};

/// One contiguous run of decoded audio, offset from the start of the track
/// (not yet shifted by the track's `start_offset_ms`).
pub struct TimedChunk {
    pub pcm: Vec<f32>,
    pub start_ms: i64,
}

/// A decoded Opus packet is at most 120ms of audio at the decoder's output rate.
const DECODE_SCRATCH_SAMPLES: usize = (DECODE_SAMPLE_RATE_HZ as usize * 120) / 1000;

/// Decodes a track's container file into a sequence of timed chunks, cutting
/// a new chunk whenever the granule jumps by more than one ingest frame — the
/// marker the container writer leaves behind for an injected silence gap
/// (spec §4.8 step 2a). The leading metadata page and trailing end-of-stream
/// page carry no payload and are skipped naturally.
pub fn decode_container_chunks(path: &Path) -> Result<Vec<TimedChunk>, Error> {
    let file = File::open(path)?;
    let mut reader = ContainerReader::new(file);
    let mut decoder = Decoder::new().map_err(|e| Error::msg(e.to_string()))?;
    let mut scratch = [0f32; DECODE_SCRATCH_SAMPLES];

    let mut chunks: Vec<TimedChunk> = Vec::new();
    let mut prev_granule = 0u64;
    let mut have_prev_granule = false;

    while let Some((payload, header)) = reader.parse_next().map_err(|e| Error::msg(e.to_string()))? {
        if payload.is_empty() {
            continue;
        }

        let is_gap = have_prev_granule && header.granule.saturating_sub(prev_granule) > FRAME_SAMPLES_IN;
        if is_gap || chunks.is_empty() {
            let start_ms = (header.granule * 1000 / INGEST_SAMPLE_RATE_HZ) as i64;
            chunks.push(TimedChunk { pcm: Vec::new(), start_ms });
        }
        prev_granule = header.granule;
        have_prev_granule = true;

        match decoder.decode(&payload, &mut scratch) {
            Ok(n) => chunks.last_mut().unwrap().pcm.extend_from_slice(&scratch[..n]),
            Err(err) => {
                tracing::warn!(error = %err, "opus decode failed during post-call decode, dropping frame");
            }
        }
    }

    Ok(chunks.into_iter().filter(|c| !c.pcm.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;

    /// Encodes one real 20ms silent frame with our own encoder so the
    /// decoder is exercised against valid Opus bytes, not hand-rolled ones.
    fn silence_opus_frame() -> Vec<u8> {
        let mut encoder = crate::codec::Encoder::new().unwrap();
        let pcm = vec![0i16; 960];
        let mut out = vec![0u8; 1024];
        let n = encoder.encode(&pcm, &mut out, 960).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn a_granule_jump_larger_than_one_frame_starts_a_new_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.bin");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ContainerWriter::new(file, 1);
        writer.write(&silence_opus_frame(), 0).unwrap();
        writer.write(&silence_opus_frame(), FRAME_SAMPLES_IN * 50).unwrap();
        writer.close().unwrap();

        let chunks = decode_container_chunks(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_ms, 0);
        assert!(chunks[1].start_ms > 0);
    }
}
