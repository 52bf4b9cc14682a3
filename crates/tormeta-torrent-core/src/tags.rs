//! Tag list normalisation and storage encoding.
//!
//! Tags are stored as a JSON array so values containing commas survive a round
//! trip. Comma-separated text is still accepted on input, both from form fields
//! and from rows written before the JSON encoding.

/// Split comma-separated tags, trimming whitespace and dropping blanks.
#[must_use]
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trim tags and drop blanks while preserving order.
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Encode tags for storage.
#[must_use]
pub fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a stored tag column.
#[must_use]
pub fn decode_tags(stored: &str) -> Vec<String> {
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    serde_json::from_str::<Vec<String>>(trimmed).map_or_else(
        |_| parse_tag_list(trimmed),
        normalize_tags,
    )
}
