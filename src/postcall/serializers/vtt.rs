//! WebVTT timed-caption document (C9, spec §4.9).
//!
//! Streaming-writer shape grounded on the teacher crate's `vtt_encoder.rs`:
//! a header line, then one cue block per entry separated by a blank line.

use std::io::Write;

use crate::error::Error;
use crate::postcall::InterleavedEntry;

/// Writes the WebVTT document for `entries` to `w`.
pub fn write_vtt<W: Write>(w: &mut W, entries: &[InterleavedEntry], omit_speaker: bool) -> Result<(), Error> {
    w.write_all(b"WEBVTT\n")?;

    for entry in entries {
        writeln!(w)?;
        writeln!(w, "{} --> {}", format_timestamp_vtt(entry.start_ms), format_timestamp_vtt(entry.end_ms))?;

        let text = html_escape(&entry.text);
        if omit_speaker {
            writeln!(w, "{text}")?;
        } else {
            let speaker = html_escape(&entry.speaker);
            writeln!(w, "<v {speaker}>({speaker}) {text}")?;
        }
    }

    w.flush()?;
    Ok(())
}

/// Formats milliseconds into a WebVTT timestamp (`HH:MM:SS.mmm`).
fn format_timestamp_vtt(total_ms: i64) -> String {
    let total_ms = total_ms.max(0) as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let total_m = total_s / 60;
    let m = total_m % 60;
    let h = total_m / 60;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
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
    fn formats_header_and_cue() {
        let entries = vec![entry("Alice", "hello <there>", 1500, 2750)];
        let mut out = Vec::new();
        write_vtt(&mut out, &entries, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("WEBVTT\n"));
        assert!(text.contains("00:00:01.500 --> 00:00:02.750"));
        assert!(text.contains("<v Alice>(Alice) hello &lt;there&gt;"));
    }

    #[test]
    fn omits_speaker_when_configured() {
        let entries = vec![entry("Alice", "hi", 0, 1000)];
        let mut out = Vec::new();
        write_vtt(&mut out, &entries, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("<v"));
        assert!(text.contains("hi"));
    }
}
