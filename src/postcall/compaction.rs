//! Text compaction rules for the plain-text document (C9, spec §4.9).

use crate::postcall::InterleavedEntry;

/// Joins consecutive entries while (1) the speaker matches, (2) the gap
/// since the previous entry's end is under `silence_threshold_ms`, and (3)
/// the running joined entry hasn't already grown past
/// `max_segment_duration_ms` measured from its own start. On join, text is
/// space-joined and the end time extends to the joined-in entry's end.
pub fn compact(entries: &[InterleavedEntry], silence_threshold_ms: i64, max_segment_duration_ms: i64) -> Vec<InterleavedEntry> {
    let mut out: Vec<InterleavedEntry> = Vec::with_capacity(entries.len());

    for curr in entries {
        match out.last_mut() {
            Some(head)
                if head.speaker == curr.speaker
                    && curr.start_ms - head.end_ms < silence_threshold_ms
                    && curr.start_ms - head.start_ms < max_segment_duration_ms =>
            {
                head.text.push(' ');
                head.text.push_str(&curr.text);
                head.end_ms = curr.end_ms;
            }
            _ => out.push(curr.clone()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(speaker: &str, text: &str, start_ms: i64, end_ms: i64) -> InterleavedEntry {
        InterleavedEntry {
            speaker: speaker.to_owned(),
            text: text.to_owned(),
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn joins_same_speaker_within_thresholds() {
        let entries = vec![entry("alice", "hello", 0, 1000), entry("alice", "world", 1500, 2000)];
        let out = compact(&entries, 2000, 10_000);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "hello world");
        assert_eq!(out[0].end_ms, 2000);
    }

    #[test]
    fn does_not_join_across_speakers() {
        let entries = vec![entry("alice", "hello", 0, 1000), entry("bob", "hi", 1200, 1800)];
        let out = compact(&entries, 2000, 10_000);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn does_not_join_across_long_silence() {
        let entries = vec![entry("alice", "hello", 0, 1000), entry("alice", "world", 5000, 6000)];
        let out = compact(&entries, 2000, 10_000);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn does_not_grow_past_max_segment_duration() {
        let entries = vec![entry("alice", "a", 0, 100), entry("alice", "b", 11_000, 11_100)];
        let out = compact(&entries, 20_000, 10_000);
        assert_eq!(out.len(), 2, "gap under silence threshold but head would exceed max duration");
    }
}
