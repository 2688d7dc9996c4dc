//! Per-track transcription (C8 step 2, spec §4.8).

use std::path::Path;

use crate::engine::{EngineParams, Segment, TranscriptionEngine, WhisperEngine};
use crate::error::Error;
use crate::postcall::decode::decode_container_chunks;
use crate::track::TrackContext;

/// Decodes `context`'s container, transcribes each chunk with a fresh engine
/// instance, and shifts every segment's timestamps onto the call's global
/// timeline (`chunk.start_ms + context.start_offset_ms`). Returns the
/// segments plus the language reported for the track (first non-empty
/// chunk-level language, `"en"` if none report one).
pub fn transcribe_track(context: &TrackContext, model_path: &Path, threads: usize) -> Result<(Vec<Segment>, String), Error> {
    let chunks = decode_container_chunks(&context.container_path)?;

    let mut engine = WhisperEngine::new(
        model_path.to_str().ok_or_else(|| Error::msg("model path is not valid UTF-8"))?,
        EngineParams::post_call(threads),
    )?;

    let mut segments = Vec::new();
    let mut language: Option<String> = None;

    for chunk in chunks {
        let (chunk_segments, chunk_language) = match engine.transcribe(&chunk.pcm) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(?err, "chunk transcription failed");
                continue;
            }
        };
        if language.is_none() && !chunk_language.is_empty() {
            language = Some(chunk_language);
        }
        for seg in chunk_segments {
            segments.push(Segment {
                text: seg.text,
                start_ms: seg.start_ms + chunk.start_ms + context.start_offset_ms,
                end_ms: seg.end_ms + chunk.start_ms + context.start_offset_ms,
            });
        }
    }

    engine.destroy()?;

    Ok((segments, language.unwrap_or_else(|| "en".to_owned())))
}
