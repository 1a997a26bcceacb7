//! Language-family regex suite producing `(file, line, column?, function?)`
//! entries from raw log text (§4.10).

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{StackFrame, StacktraceResult};

const VENDOR_SEGMENTS: &[&str] =
    &["node_modules", "vendor", "site-packages", "dist-packages", "/usr/lib", "/usr/local/lib"];

macro_rules! static_regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).expect("valid stacktrace regex"))
        }
    };
}

// `at functionName (file.js:12:5)` / `at file.js:12:5`
static_regex!(js_frame, r"(?m)^\s*at\s+(?:([\w.$<>]+)\s+\()?([^():\n]+):(\d+):(\d+)\)?");
// `File "file.py", line 12, in function`
static_regex!(py_frame, r#"(?m)File "([^"]+)", line (\d+)(?:, in (\S+))?"#);
// `file.php(25): Class->method()` or `#0 file.php(25): function()`
static_regex!(php_frame, r"(?m)(?:#\d+\s+)?([^\s():]+\.php)\((\d+)\):\s*([\w:>-]+)?");
// `at Class.method(File.java:25)`
static_regex!(java_frame, r"(?m)at\s+([\w.$]+)\(([^:]+):(\d+)\)");
// Go: `file.go:12 +0x...`
static_regex!(go_frame, r"(?m)([\w./-]+\.go):(\d+)");
// Rust: `at src/main.rs:12:5`
static_regex!(rust_frame, r"(?m)at\s+([\w./-]+\.rs):(\d+)(?::(\d+))?");

static_regex!(error_message, r"(?m)^(?:Error|Exception|Fatal error|Uncaught \w+)[:\s]+(.{1,200})$");
static_regex!(timestamp, r"(?m)^\[?(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2})");

/// Parses `raw` text (optionally pre-filtered by a `since = <N>[mhd]` window,
/// applied by the caller before this function runs) into stack frames and a
/// leading error message.
pub fn parse(raw: &str) -> StacktraceResult {
    let mut frames = Vec::new();
    collect_js(raw, &mut frames);
    collect_python(raw, &mut frames);
    collect_php(raw, &mut frames);
    collect_java(raw, &mut frames);
    collect_go(raw, &mut frames);
    collect_rust(raw, &mut frames);

    let frames = post_filter(frames);
    let message = error_message().captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string());

    StacktraceResult { frames, message }
}

/// Filters lines by a `since = <N>[mhd]` window: lines from the first
/// timestamp ≥ `now - window` onward, plus all non-timestamped lines.
pub fn filter_since(raw: &str, since: &str, now_epoch_secs: i64) -> String {
    let Some(window_secs) = parse_since(since) else { return raw.to_string() };
    let cutoff = now_epoch_secs - window_secs;
    let mut keep_from_line = 0usize;
    let lines: Vec<&str> = raw.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = timestamp().captures(line) {
            if let Some(ts) = caps.get(1).and_then(|m| parse_log_timestamp(m.as_str())) {
                if ts >= cutoff {
                    keep_from_line = i;
                    break;
                }
            }
        }
    }
    lines[keep_from_line..].join("\n")
}

fn parse_since(spec: &str) -> Option<i64> {
    let spec = spec.trim();
    let unit = spec.chars().last()?;
    let amount: i64 = spec[..spec.len() - 1].parse().ok()?;
    match unit {
        'm' => Some(amount * 60),
        'h' => Some(amount * 3600),
        'd' => Some(amount * 86_400),
        _ => None,
    }
}

fn parse_log_timestamp(s: &str) -> Option<i64> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

fn collect_js(raw: &str, frames: &mut Vec<StackFrame>) {
    for caps in js_frame().captures_iter(raw) {
        let Some(file) = caps.get(2) else { continue };
        let Some(line) = caps.get(3).and_then(|m| m.as_str().parse().ok()) else { continue };
        frames.push(StackFrame {
            file: normalize_path(file.as_str().trim()),
            line,
            column: caps.get(4).and_then(|m| m.as_str().parse().ok()),
            function: caps.get(1).map(|m| m.as_str().to_string()),
        });
    }
}

fn collect_python(raw: &str, frames: &mut Vec<StackFrame>) {
    for caps in py_frame().captures_iter(raw) {
        let Some(file) = caps.get(1) else { continue };
        let Some(line) = caps.get(2).and_then(|m| m.as_str().parse().ok()) else { continue };
        frames.push(StackFrame {
            file: normalize_path(file.as_str()),
            line,
            column: None,
            function: caps.get(3).map(|m| m.as_str().to_string()),
        });
    }
}

fn collect_php(raw: &str, frames: &mut Vec<StackFrame>) {
    for caps in php_frame().captures_iter(raw) {
        let Some(file) = caps.get(1) else { continue };
        let Some(line) = caps.get(2).and_then(|m| m.as_str().parse().ok()) else { continue };
        frames.push(StackFrame {
            file: normalize_path(file.as_str()),
            line,
            column: None,
            function: caps.get(3).map(|m| m.as_str().to_string()),
        });
    }
}

fn collect_java(raw: &str, frames: &mut Vec<StackFrame>) {
    for caps in java_frame().captures_iter(raw) {
        let Some(file) = caps.get(2) else { continue };
        let Some(line) = caps.get(3).and_then(|m| m.as_str().parse().ok()) else { continue };
        frames.push(StackFrame {
            file: normalize_path(file.as_str()),
            line,
            column: None,
            function: caps.get(1).map(|m| m.as_str().to_string()),
        });
    }
}

fn collect_go(raw: &str, frames: &mut Vec<StackFrame>) {
    for caps in go_frame().captures_iter(raw) {
        let Some(file) = caps.get(1) else { continue };
        let Some(line) = caps.get(2).and_then(|m| m.as_str().parse().ok()) else { continue };
        frames.push(StackFrame { file: normalize_path(file.as_str()), line, column: None, function: None });
    }
}

fn collect_rust(raw: &str, frames: &mut Vec<StackFrame>) {
    for caps in rust_frame().captures_iter(raw) {
        let Some(file) = caps.get(1) else { continue };
        let Some(line) = caps.get(2).and_then(|m| m.as_str().parse().ok()) else { continue };
        frames.push(StackFrame {
            file: normalize_path(file.as_str()),
            line,
            column: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            function: None,
        });
    }
}

/// Strips a leading drive letter or absolute-path slashes, forward-slashes
/// separators, and trims leading directories up to the first lowercase
/// directory name (best-effort de-absolutizing of frames from CI/other machines).
fn normalize_path(raw: &str) -> String {
    let forward = raw.replace('\\', "/");
    let without_drive = forward.splitn(2, ':').last().unwrap_or(&forward);
    let trimmed = without_drive.trim_start_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    if let Some(start) = segments.iter().position(|seg| seg.chars().next().map(|c| c.is_lowercase()).unwrap_or(false)) {
        segments[start..].join("/")
    } else {
        trimmed.to_string()
    }
}

fn post_filter(frames: Vec<StackFrame>) -> Vec<StackFrame> {
    let mut seen = HashSet::new();
    frames
        .into_iter()
        .filter(|f| !VENDOR_SEGMENTS.iter().any(|seg| f.file.contains(seg)))
        .filter(|f| seen.insert((f.file.clone(), f.line)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_php_frame_with_line_number() {
        let log = "#0 app/Http/Controllers/PaymentController.php(25): handleWebhook()\n";
        let result = parse(log);
        assert!(result.frames.iter().any(|f| f.file.ends_with("PaymentController.php") && f.line == 25));
    }

    #[test]
    fn parses_python_traceback_frame() {
        let log = "  File \"app/services/user.py\", line 42, in create_user\n";
        let result = parse(log);
        assert!(result.frames.iter().any(|f| f.file == "app/services/user.py" && f.line == 42));
    }

    #[test]
    fn drops_vendor_paths() {
        let log = "at foo (node_modules/lodash/index.js:10:2)\n";
        let result = parse(log);
        assert!(result.frames.is_empty());
    }

    #[test]
    fn dedupes_by_file_and_line() {
        let log = "File \"a.py\", line 1, in x\nFile \"a.py\", line 1, in x\n";
        let result = parse(log);
        assert_eq!(result.frames.len(), 1);
    }

    #[test]
    fn extracts_leading_error_message() {
        let log = "Error: something broke\nFile \"a.py\", line 1, in x\n";
        let result = parse(log);
        assert_eq!(result.message.as_deref(), Some("something broke"));
    }
}
