//! Ordering of size labels such as `21.3mm`, `DN50` or `125x100`.

use std::cmp::Ordering;

/// Numeric value used to order a size label. Labels without any number sort last.
pub fn numeric_size(size: &str) -> f64 {
    let trimmed = size.trim();
    if let Some(n) = leading_number(trimmed) { return n; }
    if let Some(n) = dn_number(trimmed) { return n; }
    first_number(trimmed).unwrap_or(f64::INFINITY)
}

/// Numeric order first, then case-insensitive text for ties like `50mm` vs `DN50`.
pub fn compare_sizes(a: &str, b: &str) -> Ordering {
    let (an, bn) = (numeric_size(a), numeric_size(b));
    an.partial_cmp(&bn)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}

pub fn sort_by_size<T>(items: &mut [T], size_of: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| compare_sizes(size_of(a), size_of(b)));
}

fn leading_number(s: &str) -> Option<f64> {
    let digits = number_prefix(s);
    if digits.is_empty() { None } else { digits.parse().ok() }
}

fn dn_number(s: &str) -> Option<f64> {
    let lower = s.to_ascii_lowercase();
    let mut search = lower.as_str();
    while let Some(idx) = search.find("dn") {
        let rest = &search[idx + 2..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() { return digits.parse().ok(); }
        search = rest;
    }
    None
}

fn first_number(s: &str) -> Option<f64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    leading_number(&s[start..])
}

/// `\d+(\.\d+)?` at the start of `s`.
fn number_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() { end += 1; }
    if end == 0 { return ""; }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() { end += 1; }
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_sizes() {
        assert_eq!(numeric_size("21.3mm"), 21.3);
        assert_eq!(numeric_size("114.3mm Pipe Outside Diameter"), 114.3);
        assert_eq!(numeric_size("125x100"), 125.0);
        assert_eq!(numeric_size("DN50"), 50.0);
        assert_eq!(numeric_size("Size 2\" BSP"), 2.0);
        assert_eq!(numeric_size("Custom"), f64::INFINITY);
        assert_eq!(numeric_size("7."), 7.0);
    }

    #[test]
    fn sorts_numerically_then_by_text() {
        let mut sizes = vec!["100.0mm", "DN50", "Custom", "21.3mm", "50mm"];
        sort_by_size(&mut sizes, |s| *s);
        assert_eq!(sizes, vec!["21.3mm", "50mm", "DN50", "100.0mm", "Custom"]);
    }
}
