use std::error::Error as StdError;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type, distinguishing the kinds the core must propagate
/// differently (see spec §7): config errors are fatal at startup, transport
/// errors are fatal during connect, persistence/decode/engine errors are
/// recovered locally by their caller and never reach here, publish errors are
/// fatal only after the retry budget is exhausted, and an empty transcription
/// is a fatal call-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("publish failed after exhausting retries: {0}")]
    Publish(String),

    #[error("post-call transcription produced no segments")]
    EmptyTranscription,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

/// Errors raised by a [`crate::codec::Decoder`]/[`crate::codec::Encoder`] (C3).
///
/// Kept separate from the crate-wide [`Error`] because decode failures are
/// per-packet and recovered locally (§7): callers log and drop the frame
/// rather than letting this bubble up.
#[derive(Debug, Error)]
#[error("decode error (code {0})")]
pub struct DecodeError(pub i32);

/// Errors raised while parsing the container format (C2).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ContainerError {
    #[error("bad page signature")]
    BadSignature,
    #[error("bad header type")]
    BadHeaderType,
    #[error("short page")]
    ShortPage,
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// Errors raised by [`crate::config::Config::from_env`] (A1). Always fatal.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("missing required field {0}")]
    Missing(&'static str),
    #[error("malformed id in field {0}: {1}")]
    MalformedId(&'static str, String),
    #[error("invalid url scheme for {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
