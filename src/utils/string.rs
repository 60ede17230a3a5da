//! Char-safe string shortening.
//!
//! Tool output is routinely cut to a budget before it enters the context.
//! These helpers count Unicode scalar values, never bytes, so multibyte text
//! is never split mid-character.

/// Return the first `n` characters of `s` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return `s` cut to `n` characters, with `...` appended when something was
/// cut.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Return `s` cut to `max_chars` characters followed by a line noting the
/// original length, or `s` unchanged when it fits.
///
/// ```
/// use lapka::utils::string::truncate_with_total;
///
/// assert_eq!(truncate_with_total("short", 10), "short");
/// assert_eq!(
///     truncate_with_total("abcdef", 3),
///     "abc\n... (truncated, 6 chars total)"
/// );
/// ```
pub fn truncate_with_total(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total <= max_chars {
        return s.to_string();
    }
    format!(
        "{}\n... (truncated, {} chars total)",
        prefix_chars(s, max_chars),
        total
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_basic_ascii() {
        assert_eq!(preview("hello world", 5), "hello...");
        assert_eq!(preview("hello world", 20), "hello world");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn preview_multibyte() {
        let s = "Привет, мир! 你好世界";
        assert_eq!(preview(s, 6), "Привет...");
        assert_eq!(prefix_chars(s, 3), "При");
    }

    #[test]
    fn truncate_counts_chars() {
        let s = "ё".repeat(10);
        assert_eq!(truncate_with_total(&s, 10), s);
        assert_eq!(
            truncate_with_total(&s, 4),
            "ёёёё\n... (truncated, 10 chars total)"
        );
    }
}
