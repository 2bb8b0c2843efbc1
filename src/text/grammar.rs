use snafu::Snafu;

/// Checks that a name is usable as a tag name / path segment.
/// Only alphanumerics, underscore, hyphen and dot are allowed.
pub fn validate_segment(segment: &str) -> Result<(), InvalidSegmentError> {
    if segment.is_empty()
        || !segment
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(InvalidSegmentError {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// Converts an arbitrary string into a valid path segment.
///
/// Lowercases, keeps alphanumerics plus `_` and `.`, collapses every other
/// run of characters into a single hyphen, strips edge hyphens. Returns
/// `"item"` when nothing survives.
pub fn slugify(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.trim().chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_alphanumeric() || ch == '_' || ch == '.' {
            out.push(ch);
            prev_sep = false;
        } else if !prev_sep && !out.is_empty() {
            out.push('-');
            prev_sep = true;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "item".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Escapes text content for storage. `&` must go first so the other
/// replacements cannot be double-escaped.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reverses [`escape`]. Entities are replaced in the reverse order they
/// were introduced, `&amp;` last.
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[derive(Debug, Snafu)]
#[snafu(display(
    "Invalid path segment: {segment:?} (only alphanumeric, underscore, hyphen, dot allowed)"
))]
pub struct InvalidSegmentError {
    pub segment: String,
}
