//! Track ingest (C5, spec §4.5).

pub mod ingest;

pub use ingest::{TrackContext, ingest_track};
