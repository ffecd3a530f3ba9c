//! Sandbox log post-processing.
//!
//! The provider CLI prints runtime log lines as ANSI-colored console
//! object dumps after an `INFO` level marker. The payload an operator
//! wants is the object's `data` field; everything else is framing. This
//! strips the color codes, pulls the `data` values out, and concatenates
//! them (payloads carry their own newlines).

/// Removes ANSI CSI escape sequences (colors, cursor controls).
pub fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for terminator in chars.by_ref() {
                if terminator.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Extracts the `data` payload from one log line, or `None` for lines
/// without an `INFO` object.
pub fn extract_data(line: &str) -> Option<String> {
    let clean = strip_ansi(line.trim());
    if !clean.contains("INFO") {
        return None;
    }

    let start = clean.find('{')?;
    let end = clean.rfind('}')?;
    if end <= start {
        return None;
    }
    let object = &clean[start..=end];

    // Well-formed JSON first; the CLI often emits console.log-style
    // object literals with unquoted keys, so fall back to scanning.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(object) {
        return value
            .get("data")
            .and_then(|data| data.as_str())
            .map(str::to_string);
    }
    scan_data_field(object)
}

/// Pulls the quoted string following a `data:` key out of an object
/// literal, honoring backslash escapes.
fn scan_data_field(object: &str) -> Option<String> {
    let key = object.find("data:")?;
    let rest = &object[key + "data:".len()..];

    let mut chars = rest.chars();
    let quote = loop {
        match chars.next()? {
            ' ' => continue,
            c @ ('\'' | '"') => break c,
            _ => return None,
        }
    };

    let mut value = String::new();
    let mut escaped = false;
    for c in chars {
        if escaped {
            match c {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                other => value.push(other),
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(value);
        } else {
            value.push(c);
        }
    }
    None
}

/// Filters raw `e2b sbx logs` output down to the concatenated payloads.
pub fn process_logs(raw: &str) -> String {
    raw.lines().filter_map(extract_data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[32mINFO\u{1b}[0m ready"), "INFO ready");
        assert_eq!(strip_ansi("no escapes"), "no escapes");
        assert_eq!(strip_ansi("\u{1b}[1;31mbold red\u{1b}[0m"), "bold red");
    }

    #[test]
    fn test_extract_data_from_json_object() {
        let line = r#"2024-01-01 INFO  {"timestamp": "t", "data": "hello\n"}"#;
        assert_eq!(extract_data(line).unwrap(), "hello\n");
    }

    #[test]
    fn test_extract_data_from_object_literal() {
        // console.log-style dump: unquoted keys, single-quoted strings.
        let line = "INFO  { timestamp: '2024-01-01', data: 'line one\\n' }";
        assert_eq!(extract_data(line).unwrap(), "line one\n");
    }

    #[test]
    fn test_extract_data_strips_colors_first() {
        let line = "\u{1b}[32mINFO\u{1b}[0m  { data: '\u{1b}[33mok\u{1b}[0m' }";
        assert_eq!(extract_data(line).unwrap(), "ok");
    }

    #[test]
    fn test_non_info_lines_are_dropped() {
        assert_eq!(extract_data("DEBUG { data: 'noise' }"), None);
        assert_eq!(extract_data("WARN something happened"), None);
        assert_eq!(extract_data("INFO no object here"), None);
    }

    #[test]
    fn test_object_without_data_field() {
        assert_eq!(extract_data("INFO  { level: 'info' }"), None);
        assert_eq!(extract_data(r#"INFO  {"level": "info"}"#), None);
    }

    #[test]
    fn test_process_logs_concatenates_payloads() {
        let raw = "\
INFO  { data: 'first\\n' }
DEBUG { data: 'skipped' }
INFO  { data: 'second\\n' }
";
        assert_eq!(process_logs(raw), "first\nsecond\n");
    }
}
