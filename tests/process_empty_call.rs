//! Exercises the top-level wiring of `process::run` (A7) for a call that
//! closes without any tracks: the post-call pipeline must fail with
//! `EmptyTranscription` and that failure must be reported back through the
//! orchestrator (spec §7 "An empty transcription is a fatal call-level
//! error").

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use callscribe::config::{Config, LiveCaptionsConfig, ModelSize};
use callscribe::error::Error;
use callscribe::orchestrator::{JobStatus, Orchestrator};
use callscribe::signaling::{CallEvent, CaptionMsg, MetricMsg, RtpPacket, SignalingClient, Track, TrackId};

struct NeverTrack;

impl Track for NeverTrack {
    fn id(&self) -> &TrackId {
        unreachable!("no track is ever produced by EmptyCallClient")
    }

    fn codec_mime(&self) -> &str {
        unreachable!("no track is ever produced by EmptyCallClient")
    }

    fn read_rtp(&self) -> impl Future<Output = Option<RtpPacket>> + Send {
        async { None }
    }
}

struct EmptyCallClient {
    events: AsyncMutex<std::collections::VecDeque<CallEvent<NeverTrack>>>,
}

impl EmptyCallClient {
    fn new() -> Self {
        Self {
            events: AsyncMutex::new(std::collections::VecDeque::from([
                CallEvent::Connected,
                CallEvent::JobState { start_at_unix_ms: 0 },
                CallEvent::Close,
            ])),
        }
    }
}

impl SignalingClient for EmptyCallClient {
    type Track = NeverTrack;

    async fn connect(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn next_event(&self) -> Option<CallEvent<NeverTrack>> {
        self.events.lock().await.pop_front()
    }

    fn emit_caption(&self, _msg: CaptionMsg) {}
    fn emit_metric(&self, _msg: MetricMsg) {}
}

#[derive(Default)]
struct RecordingOrchestrator {
    statuses: Mutex<Vec<(JobStatus, Option<String>)>>,
}

impl Orchestrator for RecordingOrchestrator {
    async fn get_session_profile(&self, _session_id: &str) -> Result<callscribe::signaling::SpeakerIdentity, Error> {
        unreachable!("no track ever needs a session profile in this test")
    }

    async fn get_filename(&self) -> Result<String, Error> {
        unreachable!("the pipeline fails before a filename is needed")
    }

    async fn report_job_status(&self, status: JobStatus, error: Option<String>) -> Result<(), Error> {
        self.statuses.lock().unwrap().push((status, error));
        Ok(())
    }

    async fn create_upload_session(&self, _channel_id: &str, _filename: &str, _file_size: u64) -> Result<String, Error> {
        unreachable!("the pipeline fails before publishing")
    }

    async fn upload_bytes(&self, _upload_id: &str, _bytes: Vec<u8>) -> Result<String, Error> {
        unreachable!("the pipeline fails before publishing")
    }

    async fn attach_transcriptions(&self, _post_id: &str, _language: &str, _vtt_file_id: &str, _text_file_id: &str) -> Result<(), Error> {
        unreachable!("the pipeline fails before publishing")
    }
}

fn test_config(data_dir: &std::path::Path) -> Config {
    Config {
        site_url: "https://example.com".to_owned(),
        call_id: "c".repeat(26),
        post_id: "p".repeat(26),
        auth_token: "token".to_owned(),
        job_id: "j".repeat(26),
        transcribe_api: "whisper.cpp".to_owned(),
        model_size: ModelSize::Base,
        num_threads: 1,
        output_format: "vtt".to_owned(),
        live_captions: LiveCaptionsConfig {
            enabled: false,
            model_size: ModelSize::Tiny,
            num_transcribers: 1,
            threads_per_transcriber: 1,
            language: "en".to_owned(),
        },
        webvtt_omit_speaker: false,
        text_compact_silence_threshold_ms: 2000,
        text_compact_max_segment_duration_ms: 10_000,
        data_dir: data_dir.to_path_buf(),
        models_dir: data_dir.to_path_buf(),
    }
}

#[tokio::test]
async fn empty_call_fails_and_reports_job_status() {
    let tmp = tempfile::tempdir().unwrap();
    let signaling = Arc::new(EmptyCallClient::new());
    let orchestrator = Arc::new(RecordingOrchestrator::default());
    let config = test_config(tmp.path());

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let err = callscribe::process::run(signaling, orchestrator.clone(), config, shutdown_rx)
        .await
        .expect_err("a call with no tracks has nothing to transcribe");

    assert!(matches!(err, Error::EmptyTranscription));

    let statuses = orchestrator.statuses.lock().unwrap();
    assert_eq!(statuses[0].0, JobStatus::Started);
    assert_eq!(statuses[1].0, JobStatus::Failed);
}
