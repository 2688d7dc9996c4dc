//! Transcription engine adapter (C4, spec §4.4).
//!
//! A uniform contract over one or more speech-to-text backends. Only one
//! concrete backend ships today (whisper.cpp via `whisper-rs`, grounded on
//! the teacher crate's `ctx.rs`/`backends/whisper/*`), but callers never see
//! backend-specific types.

mod whisper;

pub use whisper::WhisperEngine;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Backend-agnostic knobs, named after the table in spec §4.4.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub threads: usize,
    pub no_context: bool,
    pub audio_ctx: i32,
    /// `"auto"` is permitted and disables forced language detection.
    pub language: String,
    pub single_segment: bool,
    pub max_len: Option<i32>,
    pub split_on_word: bool,
}

impl EngineParams {
    /// Live captions use case (spec §4.4 table).
    pub fn live_captions(threads: usize, language: String) -> Self {
        Self {
            threads,
            no_context: true,
            audio_ctx: 512,
            language,
            single_segment: true,
            max_len: None,
            split_on_word: false,
        }
    }

    /// Post-call use case (spec §4.4 table).
    pub fn post_call(threads: usize) -> Self {
        Self {
            threads,
            no_context: false,
            audio_ctx: 0,
            language: "auto".to_owned(),
            single_segment: false,
            max_len: Some(8),
            split_on_word: true,
        }
    }
}

/// Uniform contract every backend implements. Inputs are always 16 kHz mono
/// float32 (§4.4); returned timestamps are in milliseconds relative to the
/// start of `samples`, with any backend-native unit conversion applied
/// inside the adapter.
pub trait TranscriptionEngine: Send {
    fn transcribe(&mut self, samples: &[f32]) -> Result<(Vec<Segment>, String), Error>;
    fn destroy(&mut self) -> Result<(), Error>;
}
