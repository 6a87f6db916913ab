//! File-name sanitization for titles reported by the external downloader.

const NAME_MAX: usize = 255;

/// Characters that are unsafe in file names on at least one common filesystem.
fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

/// Turns a media title into a file stem.
///
/// - Replaces `<>:"/\|?*` and control characters with `replacement`
/// - Trims surrounding whitespace
/// - Limits length to 255 bytes (Linux NAME_MAX), on a char boundary
pub fn sanitize_filename(name: &str, replacement: char) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if is_forbidden(c) { replacement } else { c })
        .collect();
    let trimmed = replaced.trim();

    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
