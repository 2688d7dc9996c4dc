//! whisper.cpp backend for the transcription engine adapter.
//!
//! Grounded on the teacher crate's `ctx.rs` (model loading) and
//! `segments.rs`/`backends/whisper/*` (running `full()` and walking the
//! resulting segments).

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

use super::{EngineParams, Segment, TranscriptionEngine};
use crate::error::Error;

pub struct WhisperEngine {
    ctx: WhisperContext,
    params: EngineParams,
}

impl WhisperEngine {
    pub fn new(model_path: &str, params: EngineParams) -> Result<Self, Error> {
        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_path, ctx_params)
            .map_err(|e| Error::msg(format!("failed to load model '{model_path}': {e}")))?;
        Ok(Self { ctx, params })
    }

    fn full_params(&self) -> FullParams<'_, '_> {
        let mut p = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: 5,
            patience: 1.0,
        });
        p.set_n_threads(self.params.threads as i32);
        p.set_translate(false);
        p.set_no_context(self.params.no_context);
        p.set_audio_ctx(self.params.audio_ctx);
        if self.params.language == "auto" {
            p.set_language(None);
        } else {
            p.set_language(Some(self.params.language.as_str()));
        }
        p.set_single_segment(self.params.single_segment);
        if let Some(max_len) = self.params.max_len {
            p.set_max_len(max_len);
            p.set_split_on_word(self.params.split_on_word);
        }
        p.set_print_progress(false);
        p.set_print_special(false);
        p.set_print_realtime(false);
        p.set_print_timestamps(false);
        p
    }

    fn run(&self, samples: &[f32]) -> Result<WhisperState<'_>, Error> {
        let params = self.full_params();
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| Error::msg(format!("failed to create whisper state: {e}")))?;
        state
            .full(params, samples)
            .map_err(|e| Error::msg(format!("whisper full() failed: {e}")))?;
        Ok(state)
    }
}

impl TranscriptionEngine for WhisperEngine {
    fn transcribe(&mut self, samples: &[f32]) -> Result<(Vec<Segment>, String), Error> {
        let state = self.run(samples)?;

        // whisper.cpp's native segment timestamps are centiseconds (10ms
        // units); the adapter converts to milliseconds here (spec §4.4).
        let mut segments = Vec::new();
        for seg in state.as_iter() {
            let text = seg
                .to_str()
                .map_err(|e| Error::msg(format!("failed to read segment text: {e}")))?
                .to_owned();
            segments.push(Segment {
                text,
                start_ms: seg.start_timestamp() * 10,
                end_ms: seg.end_timestamp() * 10,
            });
        }

        let language = if self.params.language == "auto" {
            let lang_id = state.full_lang_id();
            whisper_rs::get_lang_str(lang_id)
                .map(str::to_owned)
                .unwrap_or_else(|| "en".to_owned())
        } else {
            self.params.language.clone()
        };

        Ok((segments, language))
    }

    fn destroy(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
