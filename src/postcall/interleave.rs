//! Interleaving per-track transcriptions onto one timeline (C9, spec §4.9).

use crate::engine::Segment;
use crate::postcall::InterleavedEntry;

/// Flattens `(speaker, segments)` pairs, stable-sorted by `start_ms`. Ties
/// keep the order tracks were appended in `tracks` (stable sort preserves
/// the original relative order of equal keys).
pub fn interleave(tracks: Vec<(String, Vec<Segment>)>) -> Vec<InterleavedEntry> {
    let mut entries: Vec<InterleavedEntry> = tracks
        .into_iter()
        .flat_map(|(speaker, segments)| {
            segments.into_iter().map(move |seg| InterleavedEntry {
                speaker: speaker.clone(),
                text: seg.text,
                start_ms: seg.start_ms,
                end_ms: seg.end_ms,
            })
        })
        .collect();

    entries.sort_by_key(|e| e.start_ms);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_track_append_order() {
        let a = (
            "alice".to_owned(),
            vec![Segment { text: "hi".into(), start_ms: 0, end_ms: 100 }],
        );
        let b = (
            "bob".to_owned(),
            vec![Segment { text: "yo".into(), start_ms: 0, end_ms: 100 }],
        );
        let entries = interleave(vec![a, b]);
        assert_eq!(entries[0].speaker, "alice");
        assert_eq!(entries[1].speaker, "bob");
    }

    #[test]
    fn sorts_by_start_ms_across_tracks() {
        let a = (
            "alice".to_owned(),
            vec![Segment { text: "late".into(), start_ms: 500, end_ms: 600 }],
        );
        let b = (
            "bob".to_owned(),
            vec![Segment { text: "early".into(), start_ms: 100, end_ms: 200 }],
        );
        let entries = interleave(vec![a, b]);
        assert_eq!(entries[0].text, "early");
        assert_eq!(entries[1].text, "late");
    }
}
