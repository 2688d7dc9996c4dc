//! Post-call pipeline: decode, transcribe, interleave, serialize, publish
//! (C8/C9, spec §4.8/§4.9).

mod compaction;
mod decode;
mod interleave;
mod pipeline;
pub mod sanitize;
pub mod serializers;
mod transcribe;

pub use pipeline::run_post_call_pipeline;

/// One speaker turn on the call's global timeline, after interleaving (and,
/// for the plain-text document, after compaction).
#[derive(Debug, Clone)]
pub struct InterleavedEntry {
    pub speaker: String,
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}
