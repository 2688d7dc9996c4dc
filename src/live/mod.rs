//! Live captions (C6/C7, spec §4.6/§4.7).

mod loop_;
pub mod pool;
pub mod vad;
pub mod window;

pub use loop_::run_live_captions_track;
pub use pool::{CaptionJob, PoolHandle, TranscriberPool};
pub use vad::{VadDetector, WhisperVad};
