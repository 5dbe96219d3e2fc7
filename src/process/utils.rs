use std::borrow::Cow;

/// Trim whitespace; `None` when nothing is left.
pub fn non_blank(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Replace every run of whitespace (newlines included) by a single space.
pub fn collapse_whitespace(raw: &str) -> Cow<'_, str> {
    let mut prev_ws = false;
    let needs_work = raw.chars().any(|c| {
        let hit = c.is_whitespace() && (prev_ws || c != ' ');
        prev_ws = c.is_whitespace();
        hit
    });
    if !needs_work {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut in_ws = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    Cow::Owned(out)
}

/// Slice `line` by character positions, clamped to the line length. An inverted range is empty.
pub fn char_slice(line: &str, start: usize, end: usize) -> &str {
    let end = end.max(start);
    if line.is_ascii() {
        let len = line.len();
        return &line[start.min(len)..end.min(len)];
    }
    let mut indices = line.char_indices().map(|(i, _)| i).chain(std::iter::once(line.len()));
    let from = indices.nth(start).unwrap_or(line.len());
    let to = if end > start {
        indices.nth(end - start - 1).unwrap_or(line.len())
    } else {
        from
    };
    &line[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanks() {
        assert_eq!(non_blank("  a b "), Some("a b"));
        assert_eq!(non_blank("   "), None);
        assert_eq!(non_blank(""), None);
    }

    #[test]
    fn whitespace_runs() {
        assert!(matches!(collapse_whitespace("a b"), Cow::Borrowed(_)));
        assert_eq!(collapse_whitespace("a\r\n  b\tc"), "a b c");
        assert_eq!(collapse_whitespace("a  b"), "a b");
    }

    #[test]
    fn char_slices() {
        assert_eq!(char_slice("abcdef", 1, 3), "bc");
        assert_eq!(char_slice("abc", 2, 10), "c");
        assert_eq!(char_slice("abc", 5, 10), "");
        assert_eq!(char_slice("äöüxyz", 1, 4), "öüx");
        assert_eq!(char_slice("äöü", 2, 9), "ü");
        assert_eq!(char_slice("äöü", 3, 9), "");
        assert_eq!(char_slice("abcdefgh", 5, 2), "");
        assert_eq!(char_slice("äöüxyz", 4, 1), "");
    }
}
