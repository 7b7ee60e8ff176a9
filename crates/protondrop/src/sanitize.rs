//! Filename component sanitization.
//!
//! Attachment names and sender names both end up as parts of a destination
//! filename, so anything the filesystem (or a shell glob) would choke on is
//! stripped before the name is assembled.

/// Maximum length of a sanitized sender component.
pub const MAX_SENDER_LEN: usize = 64;

/// Maximum length of a sanitized attachment filename.
pub const MAX_FILENAME_LEN: usize = 128;

const STRIPPED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitizes a single filename component.
///
/// Characters unsafe for filenames are removed, runs of whitespace and
/// dashes collapse to a single `-`, and the result is trimmed and capped at
/// `max_len` characters. An empty result falls back to `"unknown"`.
pub fn sanitize_component(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if STRIPPED.contains(&c) || c.is_control() {
            continue;
        }
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    let capped: String = trimmed.chars().take(max_len).collect();
    let capped = capped.trim_end_matches(|c| c == '-' || c == '.');

    if capped.is_empty() {
        "unknown".to_string()
    } else {
        capped.to_string()
    }
}

/// Sanitizes an attachment filename, preserving the extension when the name
/// has to be truncated.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned = sanitize_component(filename, usize::MAX);
    if cleaned.chars().count() <= MAX_FILENAME_LEN {
        return cleaned;
    }

    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= 16 => {
            let ext = &cleaned[dot..];
            let keep = MAX_FILENAME_LEN - ext.len();
            let base: String = cleaned[..dot].chars().take(keep).collect();
            format!("{}{}", base.trim_end_matches('-'), ext)
        }
        _ => cleaned.chars().take(MAX_FILENAME_LEN).collect(),
    }
}
