//! Top-level process wiring (A7, spec §4.16).
//!
//! Grounded on the teacher's `bin/scribble-server/main.rs` wiring style:
//! explicit task spawning, no implicit global mutable state beyond one
//! `OnceLock` (here, [`CallStartEpoch`]). Dispatches signaling events to the
//! per-track tasks of C5 (always) and C6 (when live captions are enabled),
//! then drives C8 once the call closes.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{EngineParams, TranscriptionEngine, WhisperEngine};
use crate::epoch::CallStartEpoch;
use crate::error::Error;
use crate::live::vad::WhisperVad;
use crate::live::{TranscriberPool, run_live_captions_track};
use crate::orchestrator::{JobStatus, Orchestrator};
use crate::postcall::run_post_call_pipeline;
use crate::signaling::{CallEvent, SignalingClient, Track, TrackKind};
use crate::track::{TrackContext, ingest_track};

const DONE_CHANNEL_CAPACITY: usize = 64;
const LIVE_PACKET_QUEUE_CAPACITY: usize = 256;

/// Runs one call end to end: connects, dispatches track arrivals to C5/C6,
/// awaits the call's close, then runs the post-call pipeline (C8/C9) and
/// reports the job's terminal status to the orchestrator.
pub async fn run<S: SignalingClient, O: Orchestrator>(
    signaling: Arc<S>,
    orchestrator: Arc<O>,
    config: Config,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Error> {
    signaling.connect().await?;

    let call_start_epoch = CallStartEpoch::new();
    let mut started_reported = false;
    let (done_tx, mut done_rx) = mpsc::channel::<TrackContext>(DONE_CHANNEL_CAPACITY);

    let live_pool = if config.live_captions.enabled {
        let model_path = config.models_dir.join(format!("ggml-{}.bin", config.live_captions.model_size.as_str()));
        let threads = config.live_captions.threads_per_transcriber;
        let language = config.live_captions.language.clone();
        let (pool, handle) = TranscriberPool::spawn(config.live_captions.num_transcribers, move || {
            let engine = WhisperEngine::new(
                model_path.to_str().ok_or_else(|| Error::msg("live model path is not valid UTF-8"))?,
                EngineParams::live_captions(threads, language.clone()),
            )?;
            Ok(Box::new(engine) as Box<dyn TranscriptionEngine>)
        });
        Some((pool, handle))
    } else {
        None
    };

    let mut ingest_handles: Vec<JoinHandle<()>> = Vec::new();
    let mut live_stop_txs: Vec<watch::Sender<bool>> = Vec::new();
    let mut live_handles: Vec<JoinHandle<()>> = Vec::new();
    let mut serial = 0u32;

    loop {
        let event = tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    info!("shutdown requested, ending call loop gracefully");
                }
                break;
            }
            event = signaling.next_event() => event,
        };
        let Some(event) = event else { break };
        match event {
            CallEvent::Connected => {}
            CallEvent::JobState { start_at_unix_ms } => {
                call_start_epoch.set_from_unix_ms(start_at_unix_ms);
                // Spec §7: the job-started status is emitted only once both
                // transport is connected and the recording-start epoch is known.
                if !started_reported {
                    orchestrator.report_job_status(JobStatus::Started, None).await?;
                    started_reported = true;
                }
            }
            CallEvent::JobStop { job_id } => {
                info!(job_id, "received job-stop, ending call loop");
                break;
            }
            CallEvent::Close => break,
            CallEvent::TrackArrival { track, speaker } => {
                if track.id().kind != TrackKind::Voice || track.codec_mime() != "audio/opus" {
                    continue;
                }

                serial += 1;
                let container_path = track_container_path(&config, &speaker.user_id, &track.id().session_id);

                let live_tx = if let Some((_, pool_handle)) = &live_pool {
                    let (live_tx, live_rx) = mpsc::channel::<Vec<u8>>(LIVE_PACKET_QUEUE_CAPACITY);
                    let (stop_tx, stop_rx) = watch::channel(false);

                    match WhisperVad::new(config.models_dir.join("silero_vad.onnx").to_str().unwrap_or_default()) {
                        Ok(vad) => {
                            let pool_handle = pool_handle.clone();
                            let signaling = signaling.clone();
                            let session_id = track.id().session_id.clone();
                            let user_id = speaker.user_id.clone();
                            live_handles.push(tokio::task::spawn(async move {
                                if let Err(err) =
                                    run_live_captions_track(live_rx, stop_rx, pool_handle, Box::new(vad), signaling, session_id, user_id).await
                                {
                                    warn!(error = %err, "live captions track loop exited with an error");
                                }
                            }));
                            live_stop_txs.push(stop_tx);
                            Some(live_tx)
                        }
                        Err(err) => {
                            warn!(error = %err, "failed to load VAD model, live captions disabled for this track");
                            None
                        }
                    }
                } else {
                    None
                };

                let done_tx = done_tx.clone();
                let epoch = call_start_epoch.clone();
                ingest_handles.push(tokio::task::spawn(async move {
                    if let Err(err) = ingest_track(track, speaker, container_path, serial, epoch, done_tx, live_tx).await {
                        warn!(error = %err, "track ingest loop exited with an error");
                    }
                }));
            }
        }
    }

    for handle in ingest_handles {
        let _ = handle.await;
    }

    for stop_tx in live_stop_txs {
        let _ = stop_tx.send(true);
    }
    for handle in live_handles {
        let _ = handle.await;
    }
    if let Some((pool, _)) = live_pool {
        pool.stop().await?;
    }

    signaling.close().await?;

    drop(done_tx);
    let mut contexts = Vec::new();
    while let Some(ctx) = done_rx.recv().await {
        contexts.push(ctx);
    }

    match run_post_call_pipeline(contexts, &config, orchestrator.as_ref()).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = orchestrator.report_job_status(JobStatus::Failed, Some(err.to_string())).await;
            Err(err)
        }
    }
}

fn track_container_path(config: &Config, user_id: &str, session_id: &str) -> PathBuf {
    config.data_dir.join(&config.job_id).join(format!("{user_id}_{session_id}"))
}
