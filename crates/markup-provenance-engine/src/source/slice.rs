use xi_rope::Rope;

/// Extracts `width` bytes starting at `start`, clamped to the source bounds.
///
/// Offsets come from provenance data that may be stale or negative, so this
/// never panics: out-of-range requests shrink to whatever overlaps the text.
/// Boundaries that fall inside a multi-byte character are moved back to the
/// nearest character boundary.
pub fn safe_substr(source: &Rope, start: i64, width: i64) -> String {
    let len = source.len() as i64;
    let from = start.clamp(0, len) as usize;
    let to = (start + width.max(0)).clamp(0, len) as usize;
    if from >= to {
        return String::new();
    }
    let from = source.at_or_prev_codepoint_boundary(from).unwrap_or(0);
    let to = source.at_or_prev_codepoint_boundary(to).unwrap_or(0);
    if from >= to {
        return String::new();
    }
    source.slice_to_cow(from..to).into_owned()
}

/// Extracts text for a range, truncating to `max` bytes with "..." suffix if needed.
///
/// Used for human-readable diagnostics and snapshot output.
pub fn preview(text: &str, max: usize) -> String {
    let mut s = text.replace('\n', "\\n");
    if s.len() > max {
        s.truncate(floor_char_boundary(&s, max));
        s.push_str("...");
    }
    s
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_short_text_unchanged() {
        assert_eq!(preview("hello", 10), "hello");
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("hello world", 5), "hello...");
    }

    #[test]
    fn preview_escapes_newlines() {
        assert_eq!(preview("a\nb", 10), "a\\nb");
    }

    #[test]
    fn substr_partial_range() {
        let rope = Rope::from("hello world");
        assert_eq!(safe_substr(&rope, 6, 5), "world");
    }

    #[test]
    fn substr_clamps_out_of_bounds() {
        let rope = Rope::from("hello");
        assert_eq!(safe_substr(&rope, 3, 100), "lo");
        assert_eq!(safe_substr(&rope, -2, 4), "he");
        assert_eq!(safe_substr(&rope, 9, 2), "");
        assert_eq!(safe_substr(&rope, 1, -3), "");
    }

    #[test]
    fn substr_respects_char_boundaries() {
        let rope = Rope::from("aé");
        assert_eq!(safe_substr(&rope, 0, 2), "a");
        assert_eq!(safe_substr(&rope, 2, 1), "é");
    }

    #[test]
    fn substr_reads_only_the_requested_window() {
        let long = "ab".repeat(4096) + "→x" + &"cd".repeat(4096);
        let rope = Rope::from(long.as_str());
        let arrow = 8192;
        assert_eq!(safe_substr(&rope, arrow, 4), "→x");
        assert_eq!(safe_substr(&rope, arrow + 1, 2), "→");
        assert_eq!(safe_substr(&rope, arrow - 2, 4), "ab");
        assert_eq!(safe_substr(&rope, long.len() as i64 - 2, 10), "cd");
    }
}
