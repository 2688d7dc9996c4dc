//! Sliding window and VAD segment model for the live-captions loop (C6,
//! spec §3 "Sliding window"/"VAD segment", §4.6 steps 6–11).

pub const TICK_SECS: u64 = 2;
pub const MAX_WINDOW_SECS: u64 = 8;
pub const PRESSURE_LIMIT_SECS: u64 = 12;
pub const REMOVE_SILENCE_AFTER_SECS: u64 = 3;
pub const VAD_WINDOW_SAMPLES: usize = 512;
pub const MIN_SPEECH_SECS: u64 = 1;
pub const OUTPUT_RATE_HZ: usize = 16_000;

pub const MAX_WINDOW_SAMPLES: usize = MAX_WINDOW_SECS as usize * OUTPUT_RATE_HZ;
pub const PRESSURE_LIMIT_SAMPLES: usize = PRESSURE_LIMIT_SECS as usize * OUTPUT_RATE_HZ;
pub const REMOVE_SILENCE_AFTER_SAMPLES: usize = REMOVE_SILENCE_AFTER_SECS as usize * OUTPUT_RATE_HZ;
pub const MIN_SPEECH_SAMPLES: usize = MIN_SPEECH_SECS as usize * OUTPUT_RATE_HZ;
pub const SAMPLES_PER_MS_OUT: usize = OUTPUT_RATE_HZ / 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Silence,
    Speech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VadSegment {
    pub start: usize,
    pub end: usize,
    pub kind: SegmentKind,
}

impl VadSegment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Converts raw speech ranges (sorted, non-overlapping, from the VAD
/// detector) into segments tiling `[0, window_len)` with strictly
/// alternating kinds, reclassifying any speech segment shorter than
/// `min_speech_samples` as silence and re-merging the resulting runs.
pub fn build_segments(window_len: usize, speech_ranges: &[(usize, usize)], min_speech_samples: usize) -> Vec<VadSegment> {
    if window_len == 0 {
        return Vec::new();
    }

    let mut tiled = Vec::with_capacity(speech_ranges.len() * 2 + 1);
    let mut cursor = 0usize;
    for &(start, end) in speech_ranges {
        let start = start.min(window_len);
        let end = end.min(window_len);
        if start <= cursor && end <= cursor {
            continue;
        }
        if start > cursor {
            tiled.push(VadSegment {
                start: cursor,
                end: start,
                kind: SegmentKind::Silence,
            });
        }
        tiled.push(VadSegment {
            start,
            end,
            kind: SegmentKind::Speech,
        });
        cursor = end;
    }
    if cursor < window_len {
        tiled.push(VadSegment {
            start: cursor,
            end: window_len,
            kind: SegmentKind::Silence,
        });
    }

    for seg in &mut tiled {
        if seg.kind == SegmentKind::Speech && seg.len() < min_speech_samples {
            seg.kind = SegmentKind::Silence;
        }
    }

    merge_adjacent(tiled)
}

fn merge_adjacent(segments: Vec<VadSegment>) -> Vec<VadSegment> {
    let mut merged: Vec<VadSegment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match merged.last_mut() {
            Some(last) if last.kind == seg.kind => last.end = seg.end,
            _ => merged.push(seg),
        }
    }
    merged
}

/// Zeros every silence region, returning a new buffer the same length as
/// `window` (spec §4.6 step 8: "Build cleaned = window with silent regions
/// zeroed").
pub fn apply_silence_gate(window: &[f32], segments: &[VadSegment]) -> Vec<f32> {
    let mut cleaned = window.to_vec();
    for seg in segments {
        if seg.kind == SegmentKind::Silence {
            for sample in &mut cleaned[seg.start..seg.end] {
                *sample = 0.0;
            }
        }
    }
    cleaned
}

/// Outcome of the silence-gating decision (spec §4.6 step 9).
pub enum SilenceGate {
    /// New data is not silence: submit `cleaned` for transcription.
    Submit,
    /// Cursor-onward is all silence but hasn't reached the clear threshold
    /// yet: skip submission, keep the window as-is.
    NewIsSilence,
    /// Cursor-onward is all silence and has reached the clear threshold:
    /// the window is finished, clear it.
    WindowFinished,
}

/// Finds the segment containing `pos`, if any.
fn segment_at(segments: &[VadSegment], pos: usize) -> Option<usize> {
    segments.iter().position(|s| s.start <= pos && pos < s.end)
}

/// Implements spec §4.6 step 9: decide whether the audio starting at
/// `prev_transcribed_pos` looks like silence, is finished silence (ready to
/// clear the window), or contains new speech to submit.
pub fn decide_silence_gate(segments: &[VadSegment], prev_transcribed_pos: usize, window_len: usize) -> SilenceGate {
    let Some(cursor_idx) = segment_at(segments, prev_transcribed_pos) else {
        // No segment contains the cursor (e.g. cursor == window_len): treat
        // "new data" as non-silent per spec.
        return SilenceGate::Submit;
    };

    let all_silence_from_cursor = segments[cursor_idx..].iter().all(|s| s.kind == SegmentKind::Silence);
    if !all_silence_from_cursor {
        return SilenceGate::Submit;
    }

    let untranscribed_silence = window_len - prev_transcribed_pos;
    if untranscribed_silence >= REMOVE_SILENCE_AFTER_SAMPLES {
        SilenceGate::WindowFinished
    } else {
        SilenceGate::NewIsSilence
    }
}

/// Outcome of a window cut (spec §4.6 step 11, §8 P6).
pub struct CutResult {
    pub window: Vec<f32>,
    pub prev_transcribed_pos: usize,
}

/// Cuts `window` down toward `MAX_WINDOW_SAMPLES`, popping whole segments
/// from the front so a cut never splits a segment, and adjusts
/// `prev_transcribed_pos` by the same amount removed (P6: decreases by
/// exactly `min(k, prev_transcribed_pos)`, never below 0).
pub fn cut_to_target(window: Vec<f32>, segments: &[VadSegment], prev_transcribed_pos: usize) -> CutResult {
    if window.len() <= MAX_WINDOW_SAMPLES || segments.is_empty() {
        return CutResult {
            window,
            prev_transcribed_pos,
        };
    }

    let mut cut_up_to = 0usize;
    let mut remaining_len = window.len();
    let mut iter = segments.iter().peekable();
    while remaining_len > MAX_WINDOW_SAMPLES {
        let Some(oldest) = iter.next() else { break };
        let candidate = match iter.peek() {
            Some(next) => next.start,
            None => oldest.end,
        };
        if candidate <= cut_up_to {
            break;
        }
        cut_up_to = candidate.min(window.len());
        remaining_len = window.len() - cut_up_to;
    }

    let new_window = window[cut_up_to..].to_vec();
    let new_pos = prev_transcribed_pos.saturating_sub(cut_up_to);
    CutResult {
        window: new_window,
        prev_transcribed_pos: new_pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_segments_tiles_contiguously_with_alternating_kinds() {
        let segs = build_segments(1000, &[(200, 400), (600, 700)], 0);
        assert_eq!(segs.first().unwrap().start, 0);
        assert_eq!(segs.last().unwrap().end, 1000);
        for w in segs.windows(2) {
            assert_ne!(w[0].kind, w[1].kind);
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn short_speech_segments_are_reclassified_as_silence() {
        let segs = build_segments(1000, &[(100, 150)], 100);
        assert!(segs.iter().all(|s| s.kind == SegmentKind::Silence));
        assert_eq!(segs.len(), 1);
    }

    #[test]
    fn apply_silence_gate_zeros_only_silence_regions() {
        let window = vec![1.0f32; 10];
        let segs = vec![
            VadSegment { start: 0, end: 3, kind: SegmentKind::Silence },
            VadSegment { start: 3, end: 7, kind: SegmentKind::Speech },
            VadSegment { start: 7, end: 10, kind: SegmentKind::Silence },
        ];
        let cleaned = apply_silence_gate(&window, &segs);
        assert_eq!(&cleaned[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&cleaned[3..7], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(&cleaned[7..10], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn cut_to_target_never_splits_a_segment_and_adjusts_cursor() {
        let window = vec![0.0f32; MAX_WINDOW_SAMPLES + 5000];
        let segs = vec![
            VadSegment { start: 0, end: 4000, kind: SegmentKind::Silence },
            VadSegment { start: 4000, end: 6000, kind: SegmentKind::Speech },
            VadSegment { start: 6000, end: window.len(), kind: SegmentKind::Silence },
        ];
        let prev_pos = 5000;
        let result = cut_to_target(window, &segs, prev_pos);
        assert!(result.window.len() <= MAX_WINDOW_SAMPLES + 5000);
        assert!(result.prev_transcribed_pos <= prev_pos);
    }

    #[test]
    fn decide_silence_gate_detects_finished_silence() {
        let window_len = REMOVE_SILENCE_AFTER_SAMPLES + 10;
        let segs = vec![VadSegment {
            start: 0,
            end: window_len,
            kind: SegmentKind::Silence,
        }];
        match decide_silence_gate(&segs, 5, window_len) {
            SilenceGate::WindowFinished => {}
            _ => panic!("expected WindowFinished"),
        }
    }
}
