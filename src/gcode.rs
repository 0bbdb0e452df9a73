//! Slicer metadata extraction from G-code files.
//!
//! Slicers embed their full configuration as comment lines, either
//! `; key = value` (PrusaSlicer, OrcaSlicer, SuperSlicer) or `;KEY:value`
//! (Cura-style markers). Extraction is best-effort: malformed lines are
//! skipped and an empty map is a valid result, never an error.

use std::collections::BTreeMap;

/// Flat slicer parameter mapping, name to raw value string.
pub type ParamMap = BTreeMap<String, String>;

/// Extract embedded slicer parameters from raw G-code bytes.
pub fn extract_params(bytes: &[u8]) -> ParamMap {
    let text = String::from_utf8_lossy(bytes);
    let mut params = ParamMap::new();

    for line in text.lines() {
        let line = line.trim();
        // Metadata only ever lives in whole-line comments.
        let Some(comment) = line.strip_prefix(';') else {
            continue;
        };
        let comment = comment.trim();
        if comment.is_empty() {
            continue;
        }
        if let Some((key, value)) = parse_metadata_line(comment) {
            params.insert(key, value);
        }
    }

    params
}

/// Parse one comment body as a `key = value` or `KEY:value` metadata line.
/// Returns `None` for plain prose comments.
fn parse_metadata_line(comment: &str) -> Option<(String, String)> {
    if let Some((key, value)) = comment.split_once('=') {
        let key = key.trim();
        let value = value.trim();
        if is_param_key(key) && !value.is_empty() {
            return Some((key.to_string(), value.to_string()));
        }
        return None;
    }

    // Cura-style `;LAYER_HEIGHT:0.2` markers. Keys carry no whitespace.
    if let Some((key, value)) = comment.split_once(':') {
        let key = key.trim();
        let value = value.trim();
        if !key.is_empty()
            && !value.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Some((key.to_ascii_lowercase(), value.to_string()));
        }
    }

    None
}

/// A parameter key is word-like: letters, digits, underscores, and the odd
/// space or parenthesis slicers use in display names.
fn is_param_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')'))
}
