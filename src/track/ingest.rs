//! Per-track ingest loop (C5, spec §4.5).
//!
//! Persists a voice track losslessly into a container while reconstructing
//! clock alignment so post-call transcription can place segments on the
//! call's global timeline. The gap/advance decision (pure, deterministic) is
//! split out from the async read/write loop so it can be unit tested without
//! needing to fake wall-clock sleeps.

use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::warn;

use crate::container::ContainerWriter;
use crate::epoch::CallStartEpoch;
use crate::error::Error;
use crate::signaling::{SpeakerIdentity, Track, TrackId};

const AUDIO_GAP_THRESHOLD_MS: i64 = 1_000;
const FRAME_MS: i64 = 20;

/// One RTP frame's worth of samples at the 48 kHz ingest clock. Public
/// because C8 (`postcall::decode`) uses it as the "larger than one frame"
/// threshold for detecting a real gap in a container's granule sequence.
pub const FRAME_SAMPLES_IN: u64 = 960;

/// The RTP/ingest clock rate. Container granules written by this module are
/// in this domain, not the 16 kHz decode rate.
pub const INGEST_SAMPLE_RATE_HZ: u64 = 48_000;

const SAMPLES_PER_MS_IN: i64 = 48;

/// Per-track state carried across packets, handed off on the done channel
/// when the ingest loop exits (spec §3 "Track context").
#[derive(Debug, Clone)]
pub struct TrackContext {
    pub track_id: TrackId,
    pub speaker: SpeakerIdentity,
    pub container_path: PathBuf,
    pub start_offset_ms: i64,
}

#[derive(Debug, Default)]
struct IngestState {
    start_offset_ms: Option<i64>,
    prev_arrival: Option<Instant>,
    prev_rtp_ts: Option<u32>,
}

impl IngestState {
    /// Returns the `gap_samples` to pass to the container writer for this
    /// packet, and records the offset on the first call. Mirrors spec §4.5
    /// steps 1–5 exactly: only a genuine real-time gap (detected by cross
    /// checking wall-clock arrival against the RTP clock) injects silence;
    /// ordinary in-order, contiguous packets advance the container by zero
    /// extra samples, matching the chunk-boundary rule C8 relies on later
    /// ("a new chunk begins whenever the container reports a granule jump
    /// larger than one frame").
    fn advance(&mut self, now: Instant, call_start_epoch: Instant, rtp_ts: u32) -> u64 {
        let gap_samples = match (self.start_offset_ms, self.prev_arrival, self.prev_rtp_ts) {
            (None, _, _) => {
                let offset_ms = now.saturating_duration_since(call_start_epoch).as_millis() as i64;
                self.start_offset_ms = Some(offset_ms);
                0
            }
            (Some(_), Some(prev_arrival), Some(prev_rtp_ts)) => {
                let arrival_gap_ms = now.saturating_duration_since(prev_arrival).as_millis() as i64;
                if arrival_gap_ms > AUDIO_GAP_THRESHOLD_MS {
                    let raw_diff = rtp_ts.wrapping_sub(prev_rtp_ts);
                    // Reinterpret the 32-bit wraparound difference as signed
                    // two's complement: handles both wrap-around (P3, small
                    // positive result) and out-of-order arrival (P2, small
                    // negative result) with the same arithmetic.
                    let rtp_gap_ticks = raw_diff as i32 as i64;
                    let rtp_gap_ms = rtp_gap_ticks / SAMPLES_PER_MS_IN;
                    if (rtp_gap_ms - arrival_gap_ms).abs() > AUDIO_GAP_THRESHOLD_MS {
                        ((arrival_gap_ms / FRAME_MS) * FRAME_SAMPLES_IN as i64) as u64
                    } else {
                        0
                    }
                } else {
                    0
                }
            }
            _ => 0,
        };
        self.prev_arrival = Some(now);
        self.prev_rtp_ts = Some(rtp_ts);
        gap_samples
    }
}

/// Runs the ingest loop for one track until EOF, writing into `container_path`.
/// On exit, pushes the resulting [`TrackContext`] onto `done_tx`; if the
/// channel is full, logs and drops it (the track is excluded from the
/// transcript, per spec §4.5 "Exit").
///
/// When `live_tx` is set (live captions enabled for this call), every raw
/// packet payload is also forwarded there — C6's "bounded queue of raw
/// packet payloads from the track ingest side" (spec §4.6 "Inputs"). A full
/// queue silently drops the payload; C6 tolerates gaps in its input.
pub async fn ingest_track<T: Track>(
    track: T,
    speaker: SpeakerIdentity,
    container_path: PathBuf,
    serial: u32,
    call_start_epoch: CallStartEpoch,
    done_tx: mpsc::Sender<TrackContext>,
    live_tx: Option<mpsc::Sender<Vec<u8>>>,
) -> Result<(), Error> {
    let file = std::fs::File::create(&container_path)?;
    let mut writer = ContainerWriter::new(file, serial);
    let mut state = IngestState::default();

    loop {
        let Some(pkt) = track.read_rtp().await else {
            break;
        };

        if let Some(live_tx) = &live_tx {
            let _ = live_tx.try_send(pkt.payload.clone());
        }

        let Some(epoch) = call_start_epoch.get() else {
            continue;
        };

        let now = Instant::now();
        let gap_samples = state.advance(now, epoch, pkt.timestamp);

        if let Err(err) = writer.write(&pkt.payload, gap_samples) {
            warn!(track_id = %speaker.user_id, error = %err, "container write failed, dropping packet");
        }
    }

    writer.close()?;

    let context = TrackContext {
        track_id: track.id().clone(),
        speaker,
        container_path,
        start_offset_ms: state.start_offset_ms.unwrap_or(0),
    };

    if let Err(_dropped) = done_tx.try_send(context) {
        warn!("done channel full, dropping track context (track excluded from transcript)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_packet_sets_offset_and_zero_gap() {
        let mut state = IngestState::default();
        let epoch = Instant::now();
        let now = epoch + Duration::from_millis(42);
        let gap = state.advance(now, epoch, 1000);
        assert_eq!(gap, 0);
        assert_eq!(state.start_offset_ms, Some(42));
    }

    #[test]
    fn no_gap_injected_for_contiguous_in_order_packets() {
        let mut state = IngestState::default();
        let epoch = Instant::now();
        let now = epoch;
        state.advance(now, epoch, 1000);
        let gap = state.advance(now + Duration::from_millis(20), epoch, 2000);
        assert_eq!(gap, 0, "contiguous packets inject no silence");
    }

    #[test]
    fn out_of_order_packet_does_not_trigger_repair_path() {
        // P2: a late packet whose RTP timestamp is behind its predecessor
        // must not engage the repair path even across a real arrival gap,
        // as long as the RTP clock and arrival clock still roughly agree.
        let mut state = IngestState::default();
        let epoch = Instant::now();
        state.advance(epoch, epoch, 3000);
        let gap = state.advance(epoch + Duration::from_millis(10), epoch, 2000);
        assert_eq!(gap, 0);
    }

    #[test]
    fn wraparound_is_handled_via_signed_reinterpretation() {
        // P3: timestamps wrap the 32-bit boundary between in-order packets.
        let mut state = IngestState::default();
        let epoch = Instant::now();
        state.advance(epoch, epoch, u32::MAX - 100);
        // wrapping_sub gives a small positive delta once reinterpreted signed.
        let gap = state.advance(epoch + Duration::from_millis(5), epoch, 100);
        assert_eq!(gap, 0, "small wrapped delta within threshold injects no gap");
    }

    #[test]
    fn real_gap_beyond_threshold_injects_silence() {
        let mut state = IngestState::default();
        let epoch = Instant::now();
        state.advance(epoch, epoch, 1000);
        // 2 real seconds pass with no corresponding RTP progress: repair path
        // should fire and inject an arrival-based gap.
        let gap = state.advance(epoch + Duration::from_secs(2), epoch, 1001);
        assert!(gap > 0);
        assert_eq!(gap, (2000 / FRAME_MS as u64) * FRAME_SAMPLES_IN);
    }
}
