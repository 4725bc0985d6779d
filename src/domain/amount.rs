//! Amount extraction from free-form notification text.
//!
//! Pure functions: never fail, return 0 when no amount is present.

use super::entities::Sign;
use regex::Regex;
use std::sync::LazyLock;

/// A number directly before a currency marker, or directly after a leading one.
/// Markers must be whole words: `đã`, `đơn` and `VNDIRECT` are not currencies.
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<pre>\d(?:[\d.,]*\d)?)\s*(?:vnđ|vnd|usd|đ)\b|\b(?:vnđ|vnd|usd)\s*(?P<post>\d(?:[\d.,]*\d)?)",
    )
    .expect("amount regex")
});

static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mô tả:\s*(.+)").expect("description regex"));

/// Lowercased phrases and the direction they imply, strongest first.
/// Credit phrases outrank the bare `trừ`, which also shows up in "không trừ phí".
const SIGN_MARKERS: &[(&str, Sign)] = &[
    ("vừa giảm", Sign::Debit),
    ("vừa tăng", Sign::Credit),
    ("cộng", Sign::Credit),
    ("trừ", Sign::Debit),
];

/// Returns the first amount attached to a currency marker, unsigned. 0 when none.
pub fn extract_amount(text: &str) -> f64 {
    AMOUNT_RE
        .captures(text)
        .and_then(|caps| caps.name("pre").or_else(|| caps.name("post")))
        .and_then(|m| parse_number(m.as_str()))
        .unwrap_or(0.0)
}

/// Debit when the text says the balance went down; credit otherwise.
pub fn transaction_sign(text: &str) -> Sign {
    let lower = text.to_lowercase();
    SIGN_MARKERS
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map_or(Sign::Credit, |(_, sign)| *sign)
}

/// Amount with its sign applied (negative = debit).
pub fn signed_amount(text: &str) -> f64 {
    let amount = extract_amount(text);
    if amount == 0.0 {
        return 0.0;
    }
    transaction_sign(text).apply(amount)
}

/// The bank's own description line, if the mail carries one.
pub fn extract_description(text: &str) -> Option<String> {
    DESCRIPTION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a number that may use `.` or `,` as group separators.
///
/// The last separator is read as a decimal point only when 1-2 digits follow it;
/// everything else is grouping.
fn parse_number(raw: &str) -> Option<f64> {
    let (int_part, frac_part) = match raw.rfind(|c| c == '.' || c == ',') {
        Some(idx) if (1..=2).contains(&(raw.len() - idx - 1)) => (&raw[..idx], &raw[idx + 1..]),
        _ => (raw, ""),
    };
    let digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    if frac_part.is_empty() {
        digits.parse().ok()
    } else {
        format!("{}.{}", digits, frac_part).parse().ok()
    }
}
