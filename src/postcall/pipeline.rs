//! Post-call pipeline orchestration (C8, spec §4.8).

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::orchestrator::Orchestrator;
use crate::postcall::compaction::compact;
use crate::postcall::interleave::interleave;
use crate::postcall::sanitize::sanitize_filename;
use crate::postcall::serializers::{text::write_text, vtt::write_vtt};
use crate::postcall::transcribe::transcribe_track;
use crate::track::TrackContext;

const PUBLISH_RETRY_ATTEMPTS: u32 = 5;
const PUBLISH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Runs the full post-call pipeline for a finished call: transcribes every
/// track, fails with `EmptyTranscription` if nothing was said, serializes
/// both documents, and publishes them with the restart-from-create-session
/// retry policy of spec §6.3.
pub async fn run_post_call_pipeline<O: Orchestrator>(contexts: Vec<TrackContext>, config: &Config, orchestrator: &O) -> Result<(), Error> {
    let model_path = config.models_dir.join(format!("ggml-{}.bin", config.model_size.as_str()));

    let mut per_track = Vec::with_capacity(contexts.len());
    let mut language: Option<String> = None;

    for context in contexts {
        let model_path = model_path.clone();
        let threads = config.num_threads;
        let track_id = context.track_id.clone();
        let speaker_display_name = context.speaker.display_name.clone();

        // Decode + inference are both CPU-bound; run each track on the
        // blocking pool so one slow track doesn't stall the async reactor,
        // matching the teacher crate's habit of keeping codec/engine work off it.
        let result = tokio::task::spawn_blocking(move || transcribe_track(&context, &model_path, threads))
            .await
            .unwrap_or_else(|err| Err(Error::msg(format!("transcription task panicked: {err}"))));

        match result {
            Ok((segments, track_language)) => {
                if language.is_none() && !track_language.is_empty() {
                    language = Some(track_language);
                }
                per_track.push((speaker_display_name, segments));
            }
            Err(err) => {
                warn!(?track_id, error = %err, "track transcription failed, excluding from transcript");
            }
        }
    }

    let total_segments: usize = per_track.iter().map(|(_, segs)| segs.len()).sum();
    if total_segments == 0 {
        return Err(Error::EmptyTranscription);
    }

    let language = language.unwrap_or_else(|| "en".to_owned());
    let interleaved = interleave(per_track);
    let compacted = compact(&interleaved, config.text_compact_silence_threshold_ms, config.text_compact_max_segment_duration_ms);

    let mut vtt_bytes = Vec::new();
    write_vtt(&mut vtt_bytes, &interleaved, config.webvtt_omit_speaker)?;
    let mut text_bytes = Vec::new();
    write_text(&mut text_bytes, &compacted)?;

    let filename = sanitize_filename(&orchestrator.get_filename().await?);

    let job_dir = config.data_dir.join(&config.job_id);
    std::fs::create_dir_all(&job_dir)?;
    let vtt_path = job_dir.join(format!("{filename}.vtt"));
    let text_path = job_dir.join(format!("{filename}.txt"));
    std::fs::write(&vtt_path, &vtt_bytes)?;
    std::fs::write(&text_path, &text_bytes)?;

    publish(orchestrator, config, &vtt_path, &text_path, &language).await
}

async fn publish<O: Orchestrator>(
    orchestrator: &O,
    config: &Config,
    vtt_path: &PathBuf,
    text_path: &PathBuf,
    language: &str,
) -> Result<(), Error> {
    let vtt_bytes = std::fs::read(vtt_path)?;
    let text_bytes = std::fs::read(text_path)?;
    let vtt_filename = vtt_path.file_name().and_then(|n| n.to_str()).unwrap_or("transcript.vtt").to_owned();
    let text_filename = text_path.file_name().and_then(|n| n.to_str()).unwrap_or("transcript.txt").to_owned();

    let mut last_err = None;
    for attempt in 0..PUBLISH_RETRY_ATTEMPTS {
        match try_publish_once(orchestrator, config, &vtt_filename, &vtt_bytes, &text_filename, &text_bytes, language).await {
            Ok(()) => {
                info!(job_id = %config.job_id, "published transcription");
                return Ok(());
            }
            Err(err) => {
                warn!(attempt, error = %err, "publish attempt failed, restarting from upload-session creation");
                last_err = Some(err);
                if attempt + 1 < PUBLISH_RETRY_ATTEMPTS {
                    tokio::time::sleep(PUBLISH_RETRY_DELAY).await;
                }
            }
        }
    }

    Err(Error::Publish(last_err.map(|e| e.to_string()).unwrap_or_default()))
}

async fn try_publish_once<O: Orchestrator>(
    orchestrator: &O,
    config: &Config,
    vtt_filename: &str,
    vtt_bytes: &[u8],
    text_filename: &str,
    text_bytes: &[u8],
    language: &str,
) -> Result<(), Error> {
    // The Mattermost Calls plugin scopes a call to a single channel, so the
    // call id doubles as the upload's channel id (spec §6.2 names
    // `channel_id` but never its source).
    let channel_id = &config.call_id;

    let vtt_session = orchestrator.create_upload_session(channel_id, vtt_filename, vtt_bytes.len() as u64).await?;
    let vtt_file_id = orchestrator.upload_bytes(&vtt_session, vtt_bytes.to_vec()).await?;

    let text_session = orchestrator.create_upload_session(channel_id, text_filename, text_bytes.len() as u64).await?;
    let text_file_id = orchestrator.upload_bytes(&text_session, text_bytes.to_vec()).await?;

    orchestrator.attach_transcriptions(&config.post_id, language, &vtt_file_id, &text_file_id).await
}
