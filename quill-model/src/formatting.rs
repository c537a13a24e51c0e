//! Canonical formatting rules applied before values reach storage.

/// Trims the value, mapping empty or whitespace-only input to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v.trim().to_owned()),
        _ => None,
    }
}

/// Canonical form of a tag: trimmed and lowercased so repeated extraction
/// of identical content yields an identical fact set.
pub fn tag(value: &str) -> String {
    value.trim().to_lowercase()
}
