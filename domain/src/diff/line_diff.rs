//! Line-based diff over the longest common subsequence

use serde::{Deserialize, Serialize};

/// Largest LCS table built; bigger changed regions diff as a whole-block replace.
pub const MAX_LCS_CELLS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "line", rename_all = "lowercase")]
pub enum DiffLine {
    Equal(String),
    Added(String),
    Removed(String),
}

impl DiffLine {
    /// Unified-diff style rendering: `"  "`, `"+ "` or `"- "` prefix.
    pub fn render(&self) -> String {
        match self {
            DiffLine::Equal(line) => format!("  {}", line),
            DiffLine::Added(line) => format!("+ {}", line),
            DiffLine::Removed(line) => format!("- {}", line),
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, DiffLine::Equal(_))
    }
}

/// Diff two texts line by line.
///
/// Removals are emitted before additions at each point of divergence. When
/// the changed region between the common head and tail is too large for an
/// LCS table (see [`MAX_LCS_CELLS`]), it is reported as all of its old lines
/// removed followed by all of its new lines added.
///
/// # Example
///
/// ```
/// use council_domain::diff::{DiffLine, diff_lines};
///
/// let diff = diff_lines("a\nb\nc", "a\nc\nd");
/// assert_eq!(
///     diff,
///     vec![
///         DiffLine::Equal("a".into()),
///         DiffLine::Removed("b".into()),
///         DiffLine::Equal("c".into()),
///         DiffLine::Added("d".into()),
///     ]
/// );
/// ```
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let a: Vec<&str> = if old.is_empty() {
        Vec::new()
    } else {
        old.lines().collect()
    };
    let b: Vec<&str> = if new.is_empty() {
        Vec::new()
    } else {
        new.lines().collect()
    };

    // Common head and tail need no table
    let head = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let tail = a[head..]
        .iter()
        .rev()
        .zip(b[head..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a_mid, b_mid) = (&a[head..a.len() - tail], &b[head..b.len() - tail]);

    let mut out = Vec::with_capacity(a.len().max(b.len()));
    out.extend(a[..head].iter().map(|line| DiffLine::Equal(line.to_string())));
    if a_mid.len().saturating_mul(b_mid.len()) > MAX_LCS_CELLS {
        out.extend(a_mid.iter().map(|line| DiffLine::Removed(line.to_string())));
        out.extend(b_mid.iter().map(|line| DiffLine::Added(line.to_string())));
    } else {
        lcs_diff(a_mid, b_mid, &mut out);
    }
    out.extend(a[a.len() - tail..].iter().map(|line| DiffLine::Equal(line.to_string())));
    out
}

fn lcs_diff(a: &[&str], b: &[&str], out: &mut Vec<DiffLine>) {
    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(DiffLine::Equal(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(DiffLine::Removed(a[i].to_string()));
            i += 1;
        } else {
            out.push(DiffLine::Added(b[j].to_string()));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|line| DiffLine::Removed(line.to_string())));
    out.extend(b[j..].iter().map(|line| DiffLine::Added(line.to_string())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let diff = diff_lines("one\ntwo", "one\ntwo");
        assert!(diff.iter().all(|l| !l.is_change()));
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_replacement_orders_removal_first() {
        let diff = diff_lines("keep\nold", "keep\nnew");
        let rendered: Vec<_> = diff.iter().map(DiffLine::render).collect();
        assert_eq!(rendered, vec!["  keep", "- old", "+ new"]);
    }

    #[test]
    fn test_from_empty() {
        let diff = diff_lines("", "x\ny");
        assert_eq!(
            diff,
            vec![DiffLine::Added("x".into()), DiffLine::Added("y".into())]
        );
        assert!(diff_lines("", "").is_empty());
    }

    #[test]
    fn test_oversized_region_is_replaced_whole() {
        let old: Vec<String> = (0..1_500).map(|i| format!("old {}", i)).collect();
        let new: Vec<String> = (0..1_500).map(|i| format!("new {}", i)).collect();
        let old = format!("title\n{}\nfooter", old.join("\n"));
        let new = format!("title\n{}\nfooter", new.join("\n"));

        let diff = diff_lines(&old, &new);
        assert_eq!(diff.len(), 3_002);
        assert_eq!(diff[0], DiffLine::Equal("title".into()));
        assert_eq!(diff[1], DiffLine::Removed("old 0".into()));
        assert_eq!(diff[1_501], DiffLine::Added("new 0".into()));
        assert_eq!(diff[3_001], DiffLine::Equal("footer".into()));
    }

    #[test]
    fn test_common_head_and_tail_around_change() {
        let diff = diff_lines("a\nb\nc\nd", "a\nx\nc\nd");
        let rendered: Vec<_> = diff.iter().map(DiffLine::render).collect();
        assert_eq!(rendered, vec!["  a", "- b", "+ x", "  c", "  d"]);
    }
}
