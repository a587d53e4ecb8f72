//! JSON detection and pretty-printing for transcript lines.

use serde_json::Value;

/// Whether a line looks like a serialized JSON object or array.
///
/// The check is purely structural: the trimmed line must start with `{` and end
/// with `}`, or start with `[` and end with `]`.
pub fn is_structural_json(line: &str) -> bool {
    let trimmed = line.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}')) || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// Pretty-print a JSON line.
///
/// `\uXXXX` escapes are decoded to literal characters and the value is indented
/// over several lines. Numbers are written exactly as they arrived. Returns
/// `None` when the line is not valid JSON.
pub fn pretty_json(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

/// Render a transcript line: JSON lines are pretty-printed, everything else
/// (including malformed JSON) is kept verbatim.
pub fn render_line(line: &str) -> String {
    if is_structural_json(line) {
        if let Some(pretty) = pretty_json(line) {
            return pretty;
        }
    }
    line.to_string()
}
