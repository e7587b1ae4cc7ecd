//! Caption text sent alongside the photo.
//!
//! The caption depends only on the clock, never on the command output.

use crate::clock::Clock;

/// Upper bound on caption length, counted in characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

const CAPTION_PREFIX: &str = "Your fortune cookie for the day. Epoch time: ";

/// Escape the characters that are significant in Telegram's HTML parse mode.
pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keep at most [`MAX_CAPTION_CHARS`] characters.
pub fn truncate_caption(caption: &str) -> String {
    match caption.char_indices().nth(MAX_CAPTION_CHARS) {
        Some((end, _)) => caption[..end].to_string(),
        None => caption.to_string(),
    }
}

pub fn caption_for_epoch(epoch_secs: u64) -> String {
    let raw = format!("{}{}", CAPTION_PREFIX, epoch_secs);
    truncate_caption(&html_escape(&raw))
}

pub fn build_caption(clock: &dyn Clock) -> String {
    caption_for_epoch(clock.epoch_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[test]
    fn caption_uses_integer_epoch() {
        let clock = FixedClock::from_epoch_secs_f64(1600000000.0);
        assert_eq!(
            build_caption(&clock),
            "Your fortune cookie for the day. Epoch time: 1600000000"
        );
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            html_escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long: String = "é".repeat(2000);
        let t = truncate_caption(&long);
        assert_eq!(t.chars().count(), MAX_CAPTION_CHARS);

        let short = "abc";
        assert_eq!(truncate_caption(short), "abc");

        let exact = "x".repeat(MAX_CAPTION_CHARS);
        assert_eq!(truncate_caption(&exact), exact);
    }

    #[test]
    fn caption_has_no_newlines() {
        let c = caption_for_epoch(u64::MAX);
        assert!(!c.contains('\n'));
        assert!(c.chars().count() <= MAX_CAPTION_CHARS);
    }
}
