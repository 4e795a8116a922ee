//! Escaping for values embedded in an ffmpeg filter graph.
//!
//! A value passes through two parsers: the filter-graph parser, which splits on
//! `,` `;` `[` `]`, and the per-filter option parser, which splits on `:`.
//! Values are escaped for the option level first and the graph level second.

fn escape_option_level(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | ':') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn escape_graph_level(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escapes `value` so it is read back verbatim as a single filter option value.
pub fn escape_filter_value(value: &str) -> String {
    escape_graph_level(&escape_option_level(value))
}

/// Drops control characters other than newlines, which drawtext renders as
/// line breaks.
pub fn sanitize_overlay_text(value: &str) -> String {
    value
        .chars()
        .filter(|ch| *ch == '\n' || !ch.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
