//! Call configuration (A1, spec §3 "Call configuration" + §6.5).
//!
//! Grounded on the teacher crate's `Opts`: a single, explicit, `Clone`able
//! struct is the one contract between environment parsing and the rest of the
//! crate. `Config::from_env` is the only place that reads `std::env`.

use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Fixed per the orchestrator's plugin id; not user-configurable (§6.2 paths
/// all begin `{site}/plugins/{plugin_id}/...`).
pub const PLUGIN_ID: &str = "com.mattermost.calls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "tiny" => Some(Self::Tiny),
            "base" => Some(Self::Base),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveCaptionsConfig {
    pub enabled: bool,
    pub model_size: ModelSize,
    #[serde(deserialize_with = "de_usize_truncated")]
    pub num_transcribers: usize,
    #[serde(deserialize_with = "de_usize_truncated")]
    pub threads_per_transcriber: usize,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub site_url: String,
    pub call_id: String,
    pub post_id: String,
    pub auth_token: String,
    /// Sourced from `TRANSCRIPTION_ID`; this is the job id used in every
    /// `/jobs/{job_id}` and `/transcriptions` call.
    pub job_id: String,

    pub transcribe_api: String,
    pub model_size: ModelSize,
    #[serde(deserialize_with = "de_usize_truncated")]
    pub num_threads: usize,

    /// Only `"vtt"` is accepted (§6.5); kept as a string so an unexpected
    /// value from a round-tripped config surfaces as a validation error
    /// rather than a deserialize error.
    pub output_format: String,

    pub live_captions: LiveCaptionsConfig,

    pub webvtt_omit_speaker: bool,
    #[serde(deserialize_with = "de_i64_truncated")]
    pub text_compact_silence_threshold_ms: i64,
    #[serde(deserialize_with = "de_i64_truncated")]
    pub text_compact_max_segment_duration_ms: i64,

    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
}

fn de_usize_truncated<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    number_as_i64(&value)
        .map(|v| v.max(0) as usize)
        .ok_or_else(|| D::Error::custom("expected a number"))
}

fn de_i64_truncated<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    number_as_i64(&value).ok_or_else(|| D::Error::custom("expected a number"))
}

fn number_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().map(|f| f.trunc() as i64)
            }
        }
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let site_url = require_env("SITE_URL")?;
        validate_url_scheme("SITE_URL", &site_url)?;

        let call_id = require_env("CALL_ID")?;
        validate_id("CALL_ID", &call_id)?;
        let post_id = require_env("POST_ID")?;
        validate_id("POST_ID", &post_id)?;
        let auth_token = require_env("AUTH_TOKEN")?;
        if auth_token.is_empty() {
            return Err(ConfigError::Missing("AUTH_TOKEN"));
        }
        let job_id = require_env("TRANSCRIPTION_ID")?;
        validate_id("TRANSCRIPTION_ID", &job_id)?;

        let transcribe_api = env_or("TRANSCRIBE_API", "whisper.cpp");

        let cpus = num_cpus::get().max(1);

        let model_size = parse_model_size("MODEL_SIZE", &env_or("MODEL_SIZE", "base"))?;
        let default_threads = (cpus / 2).max(1);
        let num_threads = parse_threads("NUM_THREADS", default_threads, cpus)?;

        let output_format = env_or("OUTPUT_FORMAT", "vtt");
        if output_format != "vtt" {
            return Err(ConfigError::Invalid(
                "OUTPUT_FORMAT",
                format!("only 'vtt' is accepted, got '{output_format}'"),
            ));
        }

        let live_enabled = env_or("LIVE_CAPTIONS_ON", "false") == "true";
        let live_model_size = parse_model_size(
            "LIVE_CAPTIONS_MODEL_SIZE",
            &env_or("LIVE_CAPTIONS_MODEL_SIZE", "tiny"),
        )?;
        let num_transcribers =
            parse_positive_count("LIVE_CAPTIONS_NUM_TRANSCRIBERS", 1)?;
        let threads_per_transcriber =
            parse_positive_count("LIVE_CAPTIONS_NUM_THREADS_PER_TRANSCRIBER", 1)?;
        if live_enabled && num_transcribers * threads_per_transcriber > cpus {
            return Err(ConfigError::Invalid(
                "LIVE_CAPTIONS_NUM_THREADS_PER_TRANSCRIBER",
                format!(
                    "num_transcribers ({num_transcribers}) * threads_per_transcriber \
                     ({threads_per_transcriber}) exceeds available CPUs ({cpus})"
                ),
            ));
        }
        let live_language = env_or("LIVE_CAPTIONS_LANGUAGE", "en");

        let webvtt_omit_speaker = env_or("WEBVTT_OMIT_SPEAKER", "false") == "true";
        let text_compact_silence_threshold_ms =
            parse_i64("TEXT_COMPACT_SILENCE_THRESHOLD_MS", 2000)?;
        let text_compact_max_segment_duration_ms =
            parse_i64("TEXT_COMPACT_MAX_SEGMENT_DURATION_MS", 10_000)?;

        let data_dir = PathBuf::from(env_or("DATA_DIR", "/data"));
        let models_dir = PathBuf::from(env_or("MODELS_DIR", "/models"));

        Ok(Config {
            site_url,
            call_id,
            post_id,
            auth_token,
            job_id,
            transcribe_api,
            model_size,
            num_threads,
            output_format,
            live_captions: LiveCaptionsConfig {
                enabled: live_enabled,
                model_size: live_model_size,
                num_transcribers,
                threads_per_transcriber,
                language: live_language,
            },
            webvtt_omit_speaker,
            text_compact_silence_threshold_ms,
            text_compact_max_segment_duration_ms,
            data_dir,
            models_dir,
        })
    }

    /// Round-trip through a JSON map, truncating any numeric field that comes
    /// back as a float (§6.5: "numeric values that come back as
    /// floating-point after JSON round-trip are accepted and truncated").
    pub fn to_json_map(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn from_json_map(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

fn require_env(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn validate_id(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let ok = value.len() == 26
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(ConfigError::MalformedId(field, value.to_owned()))
    }
}

fn validate_url_scheme(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(field, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn parse_model_size(field: &'static str, value: &str) -> Result<ModelSize, ConfigError> {
    ModelSize::parse(value)
        .ok_or_else(|| ConfigError::Invalid(field, format!("unknown model size '{value}'")))
}

fn parse_threads(field: &'static str, default: usize, cpus: usize) -> Result<usize, ConfigError> {
    let raw = env_or(field, &default.to_string());
    let n: usize = raw
        .parse()
        .map_err(|_| ConfigError::Invalid(field, format!("not a positive integer: '{raw}'")))?;
    if n < 1 || n > cpus {
        return Err(ConfigError::Invalid(
            field,
            format!("must be in 1..={cpus}, got {n}"),
        ));
    }
    Ok(n)
}

fn parse_positive_count(field: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env_or(field, &default.to_string());
    let n: usize = raw
        .parse()
        .map_err(|_| ConfigError::Invalid(field, format!("not a positive integer: '{raw}'")))?;
    if n < 1 {
        return Err(ConfigError::Invalid(field, "must be at least 1".to_owned()));
    }
    Ok(n)
}

fn parse_i64(field: &'static str, default: i64) -> Result<i64, ConfigError> {
    let raw = env_or(field, &default.to_string());
    raw.parse()
        .map_err(|_| ConfigError::Invalid(field, format!("not an integer: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            site_url: "https://example.com".to_owned(),
            call_id: "a".repeat(26),
            post_id: "b".repeat(26),
            auth_token: "token".to_owned(),
            job_id: "c".repeat(26),
            transcribe_api: "whisper.cpp".to_owned(),
            model_size: ModelSize::Base,
            num_threads: 4,
            output_format: "vtt".to_owned(),
            live_captions: LiveCaptionsConfig {
                enabled: true,
                model_size: ModelSize::Tiny,
                num_transcribers: 2,
                threads_per_transcriber: 1,
                language: "en".to_owned(),
            },
            webvtt_omit_speaker: false,
            text_compact_silence_threshold_ms: 2000,
            text_compact_max_segment_duration_ms: 10_000,
            data_dir: PathBuf::from("/data"),
            models_dir: PathBuf::from("/models"),
        }
    }

    #[test]
    fn validate_id_rejects_wrong_length_and_case() {
        assert!(validate_id("X", &"a".repeat(26)).is_ok());
        assert!(validate_id("X", &"a".repeat(25)).is_err());
        assert!(validate_id("X", &"A".repeat(26)).is_err());
    }

    #[test]
    fn round_trips_through_json_with_float_truncation() {
        let cfg = sample_config();
        let mut value = cfg.to_json_map().unwrap();

        // Simulate a lossy JSON bridge that turns integers into floats.
        value["num_threads"] = serde_json::json!(4.0);
        value["live_captions"]["num_transcribers"] = serde_json::json!(2.9);

        let restored = Config::from_json_map(value).unwrap();
        assert_eq!(restored.num_threads, 4);
        assert_eq!(restored.live_captions.num_transcribers, 2);
    }

    #[test]
    fn validate_url_scheme_rejects_non_http() {
        assert!(validate_url_scheme("SITE_URL", "ftp://example.com").is_err());
        assert!(validate_url_scheme("SITE_URL", "https://example.com").is_ok());
    }
}
