//! Orchestrator HTTP client (A6, spec §6.2/§6.3).
//!
//! Grounded on the teacher crate's `reqwest`-based model-downloader: a
//! shared `reqwest::Client`, explicit per-call error context, async body
//! upload. `trait Orchestrator` names one method per endpoint; the retry
//! counters and sleeps of §6.3 live here for the two single-endpoint
//! policies (filename, session profile) and in `postcall::pipeline` for the
//! three-call upload sequence, which restarts from create-session on any
//! failure.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::PLUGIN_ID;
use crate::error::Error;
use crate::signaling::SpeakerIdentity;

pub const JOB_TYPE: &str = "transcribing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Started,
    Failed,
}

impl JobStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Failed => "failed",
        }
    }
}

/// One method per endpoint of spec §6.2. Upload-sequence retry (§6.3: "the
/// attempt starts over from create-session on any failure") is layered on
/// top of these by the caller, not inside the trait.
pub trait Orchestrator: Send + Sync + 'static {
    fn get_session_profile(&self, session_id: &str) -> impl Future<Output = Result<SpeakerIdentity, Error>> + Send;
    fn get_filename(&self) -> impl Future<Output = Result<String, Error>> + Send;
    fn report_job_status(&self, status: JobStatus, error: Option<String>) -> impl Future<Output = Result<(), Error>> + Send;
    fn create_upload_session(&self, channel_id: &str, filename: &str, file_size: u64) -> impl Future<Output = Result<String, Error>> + Send;
    fn upload_bytes(&self, upload_id: &str, bytes: Vec<u8>) -> impl Future<Output = Result<String, Error>> + Send;
    fn attach_transcriptions(&self, post_id: &str, language: &str, vtt_file_id: &str, text_file_id: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

const FILENAME_RETRY_ATTEMPTS: u32 = 5;
const FILENAME_RETRY_DELAY: Duration = Duration::from_secs(5);
const SESSION_PROFILE_RETRY_ATTEMPTS: u32 = 5;
const SESSION_PROFILE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct HttpOrchestrator {
    client: Client,
    upload_client: Client,
    site_url: String,
    call_id: String,
    job_id: String,
}

/// Checks the response status, reading the body into the error message on
/// failure: scenario 6 of spec §8 requires the error text to be exactly
/// `request failed: {body}`, not `reqwest`'s own status-line formatting.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::msg(format!("request failed: {}", body.trim())))
}

impl HttpOrchestrator {
    pub fn new(site_url: String, call_id: String, job_id: String, auth_token: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth_value = reqwest::header::HeaderValue::from_str(&format!("Bearer {auth_token}"))
            .map_err(|e| Error::msg(format!("invalid auth token: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers.clone())
            .build()?;
        let upload_client = Client::builder().timeout(UPLOAD_TIMEOUT).default_headers(headers).build()?;

        Ok(Self { client, upload_client, site_url, call_id, job_id })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/plugins/{}/bot/calls/{}{}", self.site_url.trim_end_matches('/'), PLUGIN_ID, self.call_id, path)
    }
}

impl Orchestrator for HttpOrchestrator {
    async fn get_session_profile(&self, session_id: &str) -> Result<SpeakerIdentity, Error> {
        #[derive(Deserialize)]
        struct Profile {
            user_id: String,
            display_name: String,
        }

        let url = self.url(&format!("/sessions/{session_id}/profile"));
        let profile: Profile = retry(SESSION_PROFILE_RETRY_ATTEMPTS, SESSION_PROFILE_RETRY_DELAY, || async {
            let resp = self.client.get(&url).send().await?;
            check_status(resp).await?.json().await.map_err(Error::from)
        })
        .await?;

        Ok(SpeakerIdentity { user_id: profile.user_id, display_name: profile.display_name })
    }

    async fn get_filename(&self) -> Result<String, Error> {
        #[derive(Deserialize)]
        struct FilenameResponse {
            filename: String,
        }

        let url = self.url("/filename");
        let resp: FilenameResponse = retry(FILENAME_RETRY_ATTEMPTS, FILENAME_RETRY_DELAY, || async {
            let resp = self.client.get(&url).send().await?;
            check_status(resp).await?.json().await.map_err(Error::from)
        })
        .await?;

        Ok(resp.filename)
    }

    async fn report_job_status(&self, status: JobStatus, error: Option<String>) -> Result<(), Error> {
        let url = self.url(&format!("/jobs/{}/status", self.job_id));
        let body = json!({ "job_type": JOB_TYPE, "status": status.as_str(), "error": error });
        let resp = self.client.post(&url).json(&body).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn create_upload_session(&self, channel_id: &str, filename: &str, file_size: u64) -> Result<String, Error> {
        #[derive(Deserialize)]
        struct UploadSession {
            id: String,
        }

        let url = format!("{}/plugins/{}/bot/uploads", self.site_url.trim_end_matches('/'), PLUGIN_ID);
        let body = json!({ "channel_id": channel_id, "filename": filename, "file_size": file_size });
        let resp = self.client.post(&url).json(&body).send().await?;
        let session: UploadSession = check_status(resp).await?.json().await?;
        Ok(session.id)
    }

    async fn upload_bytes(&self, upload_id: &str, bytes: Vec<u8>) -> Result<String, Error> {
        #[derive(Deserialize)]
        struct UploadResult {
            file_id: String,
        }

        let url = format!("{}/plugins/{}/bot/uploads/{upload_id}", self.site_url.trim_end_matches('/'), PLUGIN_ID);
        let resp = self.upload_client.post(&url).body(bytes).send().await?;
        let result: UploadResult = check_status(resp).await?.json().await?;
        Ok(result.file_id)
    }

    async fn attach_transcriptions(&self, post_id: &str, language: &str, vtt_file_id: &str, text_file_id: &str) -> Result<(), Error> {
        let url = self.url("/transcriptions");
        let body = json!({
            "job_id": self.job_id,
            "post_id": post_id,
            "transcriptions": [{ "language": language, "file_ids": [vtt_file_id, text_file_id] }],
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn retry<T, F, Fut>(attempts: u32, delay: Duration, mut f: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err = None;
    for attempt in 0..attempts {
        match f().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "orchestrator request failed, retrying");
                last_err = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::msg("retry loop ran zero attempts")))
}
