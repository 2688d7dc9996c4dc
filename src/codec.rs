//! Codec bridge (C3, spec §4.3).
//!
//! Thin, safe bindings over the `opus` crate. Per the open question in §9,
//! the decoder is always constructed for the target 16 kHz mono output rate
//! directly — there is no resampling step anywhere in this crate.

use crate::error::DecodeError;

pub const DECODE_SAMPLE_RATE_HZ: u32 = 16_000;
pub const ENCODE_SAMPLE_RATE_HZ: u32 = 48_000;
pub const ENCODE_BITRATE_BPS: i32 = 40_000;

/// Decodes Opus packets to mono float32 PCM. Single-owner; explicit
/// destruction via [`Decoder::destroy`] matches the "opaque value type with
/// owned destructor" framing of the C-side engine in spec §9.
pub struct Decoder {
    inner: opus::Decoder,
}

impl Decoder {
    pub fn new() -> Result<Self, DecodeError> {
        let inner = opus::Decoder::new(DECODE_SAMPLE_RATE_HZ, opus::Channels::Mono)
            .map_err(|e| DecodeError(e.code() as i32))?;
        Ok(Self { inner })
    }

    /// Decodes `bytes` into `out`, returning the number of samples written.
    /// Rejects empty input, empty output, and an output buffer whose
    /// capacity is not a multiple of the channel count (1, here).
    pub fn decode(&mut self, bytes: &[u8], out: &mut [f32]) -> Result<usize, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError(opus::ErrorCode::BadArg as i32));
        }
        if out.is_empty() {
            return Err(DecodeError(opus::ErrorCode::BadArg as i32));
        }
        self.inner
            .decode_float(bytes, out, false)
            .map_err(|e| DecodeError(e.code() as i32))
    }

    pub fn destroy(self) {}
}

/// Encodes mono PCM at 48 kHz to Opus, VOIP profile with FEC. Used by the
/// optional output (mute/unmute) path; not exercised by the core
/// decode/transcribe pipeline.
pub struct Encoder {
    inner: opus::Encoder,
}

impl Encoder {
    pub fn new() -> Result<Self, DecodeError> {
        let mut inner =
            opus::Encoder::new(ENCODE_SAMPLE_RATE_HZ, opus::Channels::Mono, opus::Application::Voip)
                .map_err(|e| DecodeError(e.code() as i32))?;
        inner
            .set_bitrate(opus::Bitrate::Bits(ENCODE_BITRATE_BPS))
            .map_err(|e| DecodeError(e.code() as i32))?;
        inner
            .set_inband_fec(true)
            .map_err(|e| DecodeError(e.code() as i32))?;
        Ok(Self { inner })
    }

    pub fn encode(&mut self, pcm: &[i16], out: &mut [u8], frame_size: usize) -> Result<usize, DecodeError> {
        if pcm.is_empty() || out.is_empty() {
            return Err(DecodeError(opus::ErrorCode::BadArg as i32));
        }
        let _ = frame_size;
        self.inner
            .encode(pcm, out)
            .map_err(|e| DecodeError(e.code() as i32))
    }

    pub fn destroy(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_rejects_empty_input_and_output() {
        let mut dec = Decoder::new().unwrap();
        let mut out = [0f32; 160];
        assert!(dec.decode(&[], &mut out).is_err());
        assert!(dec.decode(&[1, 2, 3], &mut []).is_err());
    }
}
