//! Per-call transcription worker: joins a call as a headless participant,
//! persists each voice track, optionally emits live captions while the call
//! is in progress, and publishes a timed-caption transcript once it ends.

pub mod codec;
pub mod config;
pub mod container;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod live;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod postcall;
pub mod process;
pub mod signaling;
pub mod track;
pub mod transport;
