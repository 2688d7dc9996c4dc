//! Plain-text compacted transcript document (C9, spec §4.9).

use std::io::Write;

use crate::error::Error;
use crate::postcall::InterleavedEntry;

/// Writes the plain-text document for `entries` (already compacted) to `w`:
/// a rounded-seconds time range, the speaker, then the trimmed text, each
/// entry separated by a blank line.
pub fn write_text<W: Write>(w: &mut W, entries: &[InterleavedEntry]) -> Result<(), Error> {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        writeln!(w, "{} -> {}", format_timestamp_rounded(entry.start_ms), format_timestamp_rounded(entry.end_ms))?;
        writeln!(w, "{}", entry.speaker)?;
        writeln!(w, "{}", entry.text.trim())?;
    }
    w.flush()?;
    Ok(())
}

/// Formats milliseconds into `HH:MM:SS`, rounding to the nearest second
/// (`s = round(ms / 1000)`) rather than truncating.
fn format_timestamp_rounded(total_ms: i64) -> String {
    let total_s = ((total_ms.max(0) as f64) / 1000.0).round() as u64;
    let s = total_s % 60;
    let total_m = total_s / 60;
    let m = total_m % 60;
    let h = total_m / 60;
    format!("{h:02}:{m:02}:{s:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_second() {
        assert_eq!(format_timestamp_rounded(1499), "00:00:01");
        assert_eq!(format_timestamp_rounded(1500), "00:00:02");
    }

    #[test]
    fn writes_time_range_speaker_and_trimmed_text() {
        let entries = vec![InterleavedEntry {
            speaker: "Bob".to_owned(),
            text: "  hi there  ".to_owned(),
            start_ms: 0,
            end_ms: 2000,
        }];
        let mut out = Vec::new();
        write_text(&mut out, &entries).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "00:00:00 -> 00:00:02\nBob\nhi there\n");
    }
}
