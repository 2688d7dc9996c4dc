//! Integration seam for the real-time call transport (spec §9 Design Note 1,
//! §6.1).
//!
//! The production RTC/signaling client that joins a call as a headless
//! participant and delivers `{track, receiver}` pairs is an external
//! collaborator owned by the embedding platform: no wire protocol for it is
//! named anywhere in spec.md/SPEC_FULL.md, and the retrieval pack's
//! `original_source/` carries zero source files for it (filtered out
//! upstream). [`crate::signaling::SignalingClient`] is the full, typed
//! contract this crate needs from that collaborator; `PlatformSignalingClient`
//! below exists only so `callscribe-worker` links and starts, and fails
//! loudly rather than pretending to join a call it cannot actually reach.
//!
//! Embedders that do have a concrete transport should implement
//! [`crate::signaling::SignalingClient`] directly and drive
//! [`crate::process::run`] with it instead of this binary.

use std::future::Future;

use crate::error::Error;
use crate::signaling::{CallEvent, CaptionMsg, MetricMsg, SignalingClient, Track, TrackId, RtpPacket};

/// A `Track` type is required by `SignalingClient::Track` even though this
/// stub never produces one.
pub struct UnreachableTrack;

impl Track for UnreachableTrack {
    fn id(&self) -> &TrackId {
        unreachable!("PlatformSignalingClient never yields a track")
    }

    fn codec_mime(&self) -> &str {
        unreachable!("PlatformSignalingClient never yields a track")
    }

    fn read_rtp(&self) -> impl Future<Output = Option<RtpPacket>> + Send {
        async { None }
    }
}

/// Fails on `connect()` with a clear, actionable error instead of silently
/// doing nothing. See module docs for why no real client ships here.
pub struct PlatformSignalingClient;

impl SignalingClient for PlatformSignalingClient {
    type Track = UnreachableTrack;

    async fn connect(&self) -> Result<(), Error> {
        Err(Error::Transport(
            "no real-time call transport is wired into this binary; embed this crate and implement \
             SignalingClient against your platform's RTC/signaling client instead of running callscribe-worker directly"
                .to_owned(),
        ))
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn next_event(&self) -> Option<CallEvent<Self::Track>> {
        None
    }

    fn emit_caption(&self, _msg: CaptionMsg) {}

    fn emit_metric(&self, _msg: MetricMsg) {}
}
