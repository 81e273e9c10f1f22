//! Content fingerprints, file-name sanitising, and cache keys.

use std::path::{Component, Path};

use sha2::{Digest, Sha256};

const REPLACEMENT: char = '!';
const MAX_FILE_NAME: usize = 100;

/// SHA-256 (lowercase hex) of `content` with line endings normalised to LF
/// and surrounding whitespace trimmed.
///
/// Independent of the on-disk line-ending policy.
pub fn fingerprint(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut h = Sha256::new();
    h.update(normalized.trim().as_bytes());
    hex::encode(h.finalize())
}

/// Replace characters that are unsafe in file names with `!`.
///
/// Reserved characters (`<>:"/\|?*`) and control characters are replaced,
/// runs of the replacement collapse to one, and leading/trailing replacements
/// are stripped. Windows device names (`CON`, `LPT1`, ...) get a trailing `!`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect();

    let mut out = if !replaced.is_empty() && replaced.chars().all(|c| c == '.') {
        REPLACEMENT.to_string()
    } else {
        replaced
    };

    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == REPLACEMENT && collapsed.ends_with(REPLACEMENT) {
            continue;
        }
        collapsed.push(c);
    }
    out = collapsed;

    if out.chars().count() > 1 {
        out = out.trim_matches(REPLACEMENT).to_string();
    }

    if is_windows_reserved(&out) {
        out.push(REPLACEMENT);
    }

    truncate_keeping_extension(&out, MAX_FILE_NAME)
}

/// Cut `name` to at most `max` chars, shortening only the stem so the
/// extension survives.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name[dot..].chars().count() < max => name.split_at(dot),
        _ => (name, ""),
    };
    let keep = max - ext.chars().count();
    let mut out: String = stem.chars().take(keep).collect();
    out.push_str(ext);
    out
}

fn is_windows_reserved(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => {
            let bytes = upper.as_bytes();
            bytes.len() == 4
                && (upper.starts_with("COM") || upper.starts_with("LPT"))
                && bytes[3].is_ascii_digit()
        }
    }
}

/// Cache key for `path`: relative to `root`, forward slashes, `.` components dropped.
pub fn normalize_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let root_parts = component_strings(root);
    let mut parts = component_strings(relative);
    // `root` may be spelled `./sql` while `path` is `sql/...`.
    if relative == path && parts.starts_with(&root_parts) {
        parts.drain(..root_parts.len());
    }
    parts.join("/")
}

fn component_strings(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::CurDir => None,
            Component::RootDir | Component::Prefix(_) => None,
            Component::ParentDir => Some("..".to_string()),
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        })
        .collect()
}
