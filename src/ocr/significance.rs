//! Decides whether embedded page text is a genuine text layer.

/// True when `text` holds at least `threshold` characters once spaces,
/// tabs, carriage returns and newlines are removed.
///
/// Whitespace-only text is never significant, whatever the threshold.
pub fn is_significant(text: &str, threshold: i64) -> bool {
    let count = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
        .count();

    count > 0 && count as i64 >= threshold
}
