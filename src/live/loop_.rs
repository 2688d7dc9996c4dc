//! Live-captions per-track loop (C6, spec §4.6).
//!
//! The most intricate component in this crate; see `window.rs` for the
//! pure, independently-tested pieces (tiling, silence gating, window cuts)
//! this loop drives on a 2-second tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use crate::codec::Decoder;
use crate::live::pool::{CaptionJob, PoolHandle};
use crate::live::vad::VadDetector;
use crate::live::window::{
    MIN_SPEECH_SAMPLES, PRESSURE_LIMIT_SAMPLES, REMOVE_SILENCE_AFTER_SECS, SAMPLES_PER_MS_OUT, SilenceGate, TICK_SECS,
    VAD_WINDOW_SAMPLES, apply_silence_gate, build_segments, cut_to_target, decide_silence_gate,
};
use crate::signaling::{CaptionMsg, MetricMsg, MetricName, SignalingClient};

/// A decoded Opus packet buffer is at most 120ms of 16 kHz mono audio.
const DECODE_SCRATCH_SAMPLES: usize = 1920;

/// Drives the 13-step per-tick algorithm for one track until `stop_rx`
/// reports true. `packet_rx` carries raw Opus payloads handed off by the
/// track's decode side (see spec §4.6 "Inputs").
pub async fn run_live_captions_track<C: SignalingClient>(
    mut packet_rx: mpsc::Receiver<Vec<u8>>,
    mut stop_rx: watch::Receiver<bool>,
    pool: PoolHandle,
    mut vad: Box<dyn VadDetector>,
    client: Arc<C>,
    session_id: String,
    user_id: String,
) -> Result<(), crate::error::Error> {
    let mut decoder = Decoder::new().map_err(|e| crate::error::Error::msg(e.to_string()))?;
    let mut window: Vec<f32> = Vec::with_capacity(PRESSURE_LIMIT_SAMPLES);
    let mut prev_window_len = 0usize;
    let mut prev_transcribed_pos = 0usize;
    let mut prev_audio_at: Option<Instant> = None;
    let mut decode_scratch = [0f32; DECODE_SCRATCH_SAMPLES];

    let mut ticker = tokio::time::interval(Duration::from_secs(TICK_SECS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                // Step 1: drain all currently available packets, decoding each.
                while let Ok(payload) = packet_rx.try_recv() {
                    match decoder.decode(&payload, &mut decode_scratch) {
                        Ok(n) => window.extend_from_slice(&decode_scratch[..n]),
                        Err(err) => warn!(%session_id, error = %err, "opus decode failed, dropping frame"),
                    }
                }

                // Step 2.
                if window.len() < VAD_WINDOW_SAMPLES {
                    continue;
                }

                let now = Instant::now();

                // Step 3: no new audio this tick.
                if window.len() == prev_window_len {
                    let silent_too_long = prev_audio_at
                        .map(|prev| now.duration_since(prev) > Duration::from_secs(REMOVE_SILENCE_AFTER_SECS))
                        .unwrap_or(false);
                    if silent_too_long {
                        window.clear();
                        prev_window_len = 0;
                        prev_transcribed_pos = 0;
                    }
                    continue;
                }

                // Step 4: pressure valve.
                if window.len() >= PRESSURE_LIMIT_SAMPLES {
                    window.clear();
                    prev_window_len = 0;
                    prev_transcribed_pos = 0;
                    crate::metrics::record_window_dropped();
                    client.emit_metric(MetricMsg {
                        session_id: session_id.clone(),
                        metric_name: MetricName::LiveCaptionsWindowDropped,
                    });
                    continue;
                }

                // Step 5.
                let new_ms = (window.len() - prev_window_len) / SAMPLES_PER_MS_OUT;
                prev_audio_at = Some(now);
                prev_window_len = window.len();

                // Step 6: VAD.
                let speech_ranges = match vad.detect_speech_ranges(&window) {
                    Ok(ranges) => ranges,
                    Err(err) => {
                        warn!(%session_id, error = %err, "VAD inference failed, skipping tick");
                        continue;
                    }
                };
                vad.reset();
                if speech_ranges.is_empty() {
                    continue;
                }

                // Step 7.
                let segments = build_segments(window.len(), &speech_ranges, MIN_SPEECH_SAMPLES);

                // Step 8.
                let cleaned = apply_silence_gate(&window, &segments);

                // Step 9.
                match decide_silence_gate(&segments, prev_transcribed_pos, window.len()) {
                    SilenceGate::WindowFinished => {
                        window.clear();
                        prev_window_len = 0;
                        prev_transcribed_pos = 0;
                        continue;
                    }
                    SilenceGate::NewIsSilence => continue,
                    SilenceGate::Submit => {
                        prev_transcribed_pos = cleaned.len();
                        let (reply_tx, reply_rx) = oneshot::channel();
                        let job = CaptionJob { pcm: cleaned, reply: reply_tx };

                        let submitted = pool.try_submit(job);

                        // Step 11: cut the window toward the target size
                        // regardless of whether submission succeeded.
                        let cut = cut_to_target(window, &segments, prev_transcribed_pos);
                        window = cut.window;
                        prev_transcribed_pos = cut.prev_transcribed_pos;
                        prev_window_len = window.len();

                        match submitted {
                            Ok(()) => {
                                // Step 12: wait for the reply or the next tick.
                                tokio::select! {
                                    reply = reply_rx => {
                                        if let Ok(text) = reply {
                                            if !text.is_empty() {
                                                client.emit_caption(CaptionMsg {
                                                    session_id: session_id.clone(),
                                                    user_id: user_id.clone(),
                                                    text,
                                                    new_audio_len_ms: new_ms as f64,
                                                });
                                            }
                                        }
                                    }
                                    _ = ticker.tick() => {
                                        warn!(%session_id, "dropped tick waiting for caption reply");
                                    }
                                }
                            }
                            Err(dropped) => {
                                drop(dropped.reply);
                                crate::metrics::record_transcriber_buf_full();
                                client.emit_metric(MetricMsg {
                                    session_id: session_id.clone(),
                                    metric_name: MetricName::LiveCaptionsTranscriberBufFull,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
