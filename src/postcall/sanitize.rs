//! Filename sanitization (spec §4.9 "Filename sanitization").

const FORBIDDEN: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|', '\n', '/'];

/// Replaces each forbidden character (path separators, reserved Windows
/// characters, and whitespace) with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters_and_whitespace() {
        assert_eq!(sanitize_filename("my call: q1/q2 *notes*"), "my_call__q1_q2__notes_");
    }

    #[test]
    fn leaves_ordinary_names_untouched() {
        assert_eq!(sanitize_filename("standup-2026-07-26"), "standup-2026-07-26");
    }
}
