//! Classification replies: `CATEGORY - note`.

use super::entities::Classification;
use super::errors::DomainError;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Separator between category and note in a reply.
pub const REPLY_SEPARATOR: &str = " - ";

/// Usage line shown when a reply can't be parsed.
pub const REPLY_USAGE: &str = "Reply in the form: CATEGORY - note\nExample: MUA_SAM - mua quần áo";

/// Split a reply into a normalized category and a note.
pub fn parse_reply(text: &str) -> Result<Classification, DomainError> {
    let Some((category, note)) = text.split_once(REPLY_SEPARATOR) else {
        return Err(DomainError::Validation(format!(
            "missing '{}' separator",
            REPLY_SEPARATOR.trim()
        )));
    };
    let category = normalize_category(category);
    let note = note.trim();
    if category.is_empty() || note.is_empty() {
        return Err(DomainError::Validation(
            "category and note must not be empty".into(),
        ));
    }
    Ok(Classification {
        category,
        note: note.to_string(),
    })
}

/// Strip diacritics, uppercase, and join words with `_`: "ăn uống" -> "AN_UONG".
pub fn normalize_category(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect();
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}
