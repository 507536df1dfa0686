//! Language code helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Language code assigned when a language is removed from the system.
pub const LANGCODE_NOT_SPECIFIED: &str = "und";
/// Language code for content where language does not apply.
pub const LANGCODE_NOT_APPLICABLE: &str = "zxx";
/// Site default language used when callers do not pick one.
pub const LANGCODE_DEFAULT: &str = "en";

static LANGCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{1,8})*$").expect("valid langcode regex"));

/// Normalizes one language code to trimmed lowercase form.
///
/// Returns `None` when the value is not a well-formed language tag.
pub fn normalize_langcode(value: &str) -> Option<String> {
    let normalized = value.trim().to_ascii_lowercase();
    if LANGCODE_RE.is_match(&normalized) {
        Some(normalized)
    } else {
        None
    }
}

/// Returns whether `value` is already a normalized language code.
pub fn is_valid_langcode(value: &str) -> bool {
    LANGCODE_RE.is_match(value)
}

/// Returns whether `value` is one of the "no language" sentinels.
pub fn is_locked_langcode(value: &str) -> bool {
    value == LANGCODE_NOT_SPECIFIED || value == LANGCODE_NOT_APPLICABLE
}
