//! Shared string helpers.

/// Longest prefix of `s` that fits in `max_bytes` and ends on a char boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = (0..=max_bytes)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    &s[..end]
}

/// Like [`truncate_str`], appending `…` when anything was cut.
///
/// Used for log lines and failure messages that embed model output.
pub fn elide(s: &str, max_bytes: usize) -> String {
    let cut = truncate_str(s, max_bytes);
    if cut.len() == s.len() {
        s.to_string()
    } else {
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundary() {
        // 'é' is 2 bytes
        assert_eq!(truncate_str("café au lait", 4), "caf");
        assert_eq!(truncate_str("café", 5), "café");
        assert_eq!(truncate_str("", 3), "");
    }

    #[test]
    fn elide_marks_cut() {
        assert_eq!(elide("short", 10), "short");
        assert_eq!(elide("a longer message", 8), "a longer…");
    }
}
