//! VAD bridge used by the live-captions loop (C6 step 6).
//!
//! Grounded on the teacher crate's `vad/processor.rs` and `vad/to_speech.rs`,
//! which drive `whisper_rs::WhisperVadContext::segments_from_samples` and
//! convert its centisecond timestamps into sample indices.

use whisper_rs::{WhisperVadContext, WhisperVadContextParams, WhisperVadParams};

use crate::error::Error;
use crate::live::window::OUTPUT_RATE_HZ;

/// A speech/silence classifier over a whole buffer of 16 kHz mono PCM.
pub trait VadDetector: Send {
    /// Returns sorted, non-overlapping speech ranges (sample indices) found
    /// in `samples`.
    fn detect_speech_ranges(&mut self, samples: &[f32]) -> Result<Vec<(usize, usize)>, Error>;

    /// Resets any internal state between windows (spec §4.6 step 6: "Reset
    /// the detector afterwards").
    fn reset(&mut self);
}

pub struct WhisperVad {
    ctx: WhisperVadContext,
}

impl WhisperVad {
    pub fn new(model_path: &str) -> Result<Self, Error> {
        let params = WhisperVadContextParams::default();
        let ctx = WhisperVadContext::new(model_path, params)
            .map_err(|e| Error::msg(format!("failed to load VAD model '{model_path}': {e}")))?;
        Ok(Self { ctx })
    }
}

impl VadDetector for WhisperVad {
    fn detect_speech_ranges(&mut self, samples: &[f32]) -> Result<Vec<(usize, usize)>, Error> {
        let params = WhisperVadParams::default();
        let segments = self
            .ctx
            .segments_from_samples(params, samples)
            .map_err(|e| Error::msg(format!("VAD inference failed: {e}")))?;

        let rate = OUTPUT_RATE_HZ as f32;
        let n = segments.num_segments();
        let mut ranges = Vec::with_capacity(n as usize);
        for i in 0..n {
            let start_cs = segments
                .get_segment_start_timestamp(i)
                .ok_or_else(|| Error::msg(format!("missing start timestamp for VAD segment {i}")))?;
            let end_cs = segments
                .get_segment_end_timestamp(i)
                .ok_or_else(|| Error::msg(format!("missing end timestamp for VAD segment {i}")))?;

            let start_idx = ((start_cs / 100.0) * rate).floor().max(0.0) as usize;
            let end_idx = ((end_cs / 100.0) * rate).ceil().max(0.0) as usize;
            ranges.push((start_idx.min(samples.len()), end_idx.min(samples.len())));
        }
        Ok(ranges)
    }

    fn reset(&mut self) {
        // whisper.cpp's VAD context is stateless across calls to
        // `segments_from_samples`; nothing to reset.
    }
}
