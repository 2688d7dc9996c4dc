//! Signaling/transport client (A5, spec §4.14, §6.1, §9 Design Note 1).
//!
//! The original transport client exposes callback-registration (`on(event,
//! handler)`). Per Design Note 1 this is reimplemented as a trait with
//! explicit async methods and a typed event enum instead of dynamic
//! reflection, in the spirit of the teacher crate's preference for explicit,
//! typed contracts over its backend trait (`src/backend.rs`).

use std::future::Future;

use crate::error::Error;

/// A parsed track id: `{type}_{session_id}` per spec §6.1. Only `Voice`
/// tracks with MIME `audio/opus` are processed by C5/C6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackId {
    pub kind: TrackKind,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Voice,
    Other,
}

impl TrackId {
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, session_id) = raw.split_once('_')?;
        let kind = match kind {
            "voice" => TrackKind::Voice,
            _ => TrackKind::Other,
        };
        Some(Self {
            kind,
            session_id: session_id.to_owned(),
        })
    }
}

/// One RTP packet read off a track.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub payload: Vec<u8>,
    pub timestamp: u32,
}

/// A single voice track, as exposed by the signaling client on track-arrival.
pub trait Track: Send + Sync + 'static {
    fn id(&self) -> &TrackId;
    fn codec_mime(&self) -> &str;

    /// Reads the next RTP packet, or `None` on track EOF.
    fn read_rtp(&self) -> impl Future<Output = Option<RtpPacket>> + Send;
}

/// Identity of the speaking user on a track, resolved via the orchestrator's
/// session-profile endpoint (§6.2).
#[derive(Debug, Clone)]
pub struct SpeakerIdentity {
    pub user_id: String,
    pub display_name: String,
}

/// Event stream the core drives its state machine from, mirroring the five
/// registrations of §6.1 (`connected`, `track-arrival`, `job-state`,
/// `job-stop`, `close`).
pub enum CallEvent<T: Track> {
    Connected,
    TrackArrival { track: T, speaker: SpeakerIdentity },
    JobState { start_at_unix_ms: i64 },
    JobStop { job_id: String },
    Close,
}

/// Caption/metric event payloads (§6.4).
#[derive(Debug, Clone)]
pub struct CaptionMsg {
    pub session_id: String,
    pub user_id: String,
    pub text: String,
    pub new_audio_len_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    LiveCaptionsWindowDropped,
    LiveCaptionsTranscriberBufFull,
}

#[derive(Debug, Clone)]
pub struct MetricMsg {
    pub session_id: String,
    pub metric_name: MetricName,
}

/// The transport client contract the core consumes (§6.1).
pub trait SignalingClient: Send + Sync + 'static {
    type Track: Track;

    fn connect(&self) -> impl Future<Output = Result<(), Error>> + Send;
    fn close(&self) -> impl Future<Output = Result<(), Error>> + Send;
    fn next_event(&self) -> impl Future<Output = Option<CallEvent<Self::Track>>> + Send;
    fn emit_caption(&self, msg: CaptionMsg);
    fn emit_metric(&self, msg: MetricMsg);
}

#[cfg(test)]
pub mod test_support {
    use std::sync::Mutex;

    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    /// In-memory queue a test can push synthetic events/packets onto,
    /// grounded on the teacher crate's `DummyBackend` test fixtures
    /// (`tests/scribble.rs`).
    pub struct FakeTrack {
        pub id: TrackId,
        pub packets: AsyncMutex<std::collections::VecDeque<RtpPacket>>,
    }

    impl Track for FakeTrack {
        fn id(&self) -> &TrackId {
            &self.id
        }

        fn codec_mime(&self) -> &str {
            "audio/opus"
        }

        async fn read_rtp(&self) -> Option<RtpPacket> {
            self.packets.lock().await.pop_front()
        }
    }

    pub struct FakeSignalingClient {
        events: Mutex<std::collections::VecDeque<CallEvent<FakeTrack>>>,
        pub captions: Mutex<Vec<CaptionMsg>>,
        pub metrics: Mutex<Vec<MetricMsg>>,
    }

    impl FakeSignalingClient {
        pub fn new(events: Vec<CallEvent<FakeTrack>>) -> Self {
            Self {
                events: Mutex::new(events.into()),
                captions: Mutex::new(Vec::new()),
                metrics: Mutex::new(Vec::new()),
            }
        }
    }

    impl SignalingClient for FakeSignalingClient {
        type Track = FakeTrack;

        async fn connect(&self) -> Result<(), Error> {
            Ok(())
        }

        async fn close(&self) -> Result<(), Error> {
            Ok(())
        }

        async fn next_event(&self) -> Option<CallEvent<FakeTrack>> {
            self.events.lock().unwrap().pop_front()
        }

        fn emit_caption(&self, msg: CaptionMsg) {
            self.captions.lock().unwrap().push(msg);
        }

        fn emit_metric(&self, msg: MetricMsg) {
            self.metrics.lock().unwrap().push(msg);
        }
    }

    #[test]
    fn track_id_parses_voice_tracks() {
        let id = TrackId::parse("voice_abc123").unwrap();
        assert_eq!(id.kind, TrackKind::Voice);
        assert_eq!(id.session_id, "abc123");
    }
}
