//! Per-language regex pass producing named, kinded, line-ranged symbols (§4.4).
//! Shallow by design: breadth over precision, tolerant of over-broad end lines.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::{Symbol, SymbolKind};

const MAX_LOOKAHEAD_LINES: usize = 500;

/// Keywords that would otherwise false-positive as symbol names from loose regexes.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "switch", "case", "do", "try", "catch", "finally", "return",
    "break", "continue", "new", "delete", "typeof", "instanceof", "in", "of", "function",
    "async", "await", "yield", "static", "public", "private", "protected",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyStyle {
    Brace,
    Indent,
}

struct Rule {
    kind: SymbolKind,
    pattern: &'static Regex,
}

fn body_style_for(language: &str) -> BodyStyle {
    match language {
        "python" | "ruby" => BodyStyle::Indent,
        _ => BodyStyle::Brace,
    }
}

macro_rules! static_regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).expect("valid symbol regex"))
        }
    };
}

// TypeScript / JavaScript family
static_regex!(ts_class, r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)");
static_regex!(ts_interface, r"(?m)^\s*(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)");
static_regex!(ts_type_alias, r"(?m)^\s*(?:export\s+)?type\s+([A-Za-z_$][\w$]*)\s*=");
static_regex!(ts_function, r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s+([A-Za-z_$][\w$]*)");
static_regex!(ts_arrow_const, r"(?m)^\s*(?:export\s+)?const\s+([A-Za-z_$][\w$]*)\s*(?::\s*[^=]+)?=\s*(?:async\s*)?\(");
static_regex!(ts_method, r"(?m)^\s*(?:public\s+|private\s+|protected\s+|static\s+|async\s+)*([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?::\s*[\w<>\[\]| ]+)?\s*\{");

// PHP
static_regex!(php_class, r"(?m)^\s*(?:abstract\s+|final\s+)?class\s+([A-Za-z_][\w]*)");
static_regex!(php_interface, r"(?m)^\s*interface\s+([A-Za-z_][\w]*)");
static_regex!(php_trait, r"(?m)^\s*trait\s+([A-Za-z_][\w]*)");
static_regex!(php_function, r"(?m)^\s*(?:public\s+|private\s+|protected\s+|static\s+)*function\s+([A-Za-z_][\w]*)\s*\(");

// Python
static_regex!(py_class, r"(?m)^\s*class\s+([A-Za-z_]\w*)");
static_regex!(py_def, r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)");

// Go
static_regex!(go_type, r"(?m)^\s*type\s+([A-Za-z_]\w*)\s+(?:struct|interface)\b");
static_regex!(go_func, r"(?m)^\s*func\s*(?:\([^)]*\))?\s*([A-Za-z_]\w*)\s*\(");

// Rust
static_regex!(rust_struct, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_]\w*)");
static_regex!(rust_enum, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_]\w*)");
static_regex!(rust_trait, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+([A-Za-z_]\w*)");
static_regex!(rust_impl, r"(?m)^\s*impl(?:<[^>]*>)?\s+(?:[A-Za-z_][\w:]*\s+for\s+)?([A-Za-z_]\w*)");
static_regex!(rust_fn, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_]\w*)");

// Ruby
static_regex!(ruby_class, r"(?m)^\s*class\s+([A-Za-z_]\w*)");
static_regex!(ruby_module, r"(?m)^\s*module\s+([A-Za-z_]\w*)");
static_regex!(ruby_def, r"(?m)^\s*def\s+(?:self\.)?([A-Za-z_]\w*[?!=]?)");

// Java / Kotlin / C# / Swift
static_regex!(java_class, r"(?m)^\s*(?:public\s+|private\s+|protected\s+|final\s+|abstract\s+|static\s+)*class\s+([A-Za-z_]\w*)");
static_regex!(java_interface, r"(?m)^\s*(?:public\s+)?interface\s+([A-Za-z_]\w*)");
static_regex!(java_method, r"(?m)^\s*(?:public\s+|private\s+|protected\s+|static\s+|final\s+|override\s+|func\s+)*[\w<>\[\]]+\s+([A-Za-z_]\w*)\s*\([^)]*\)\s*\{");

// Generic fallback
static_regex!(generic_function, r"(?m)^\s*(?:function|func|fn|def)\s+([A-Za-z_]\w*)");
static_regex!(generic_class, r"(?m)^\s*class\s+([A-Za-z_]\w*)");

fn rules_for(language: &str) -> Vec<Rule> {
    match language {
        "typescript" | "javascript" | "vue" => vec![
            Rule { kind: SymbolKind::Class, pattern: ts_class() },
            Rule { kind: SymbolKind::Interface, pattern: ts_interface() },
            Rule { kind: SymbolKind::Interface, pattern: ts_type_alias() },
            Rule { kind: SymbolKind::Function, pattern: ts_function() },
            Rule { kind: SymbolKind::Constant, pattern: ts_arrow_const() },
            Rule { kind: SymbolKind::Method, pattern: ts_method() },
        ],
        "php" => vec![
            Rule { kind: SymbolKind::Class, pattern: php_class() },
            Rule { kind: SymbolKind::Interface, pattern: php_interface() },
            Rule { kind: SymbolKind::Class, pattern: php_trait() },
            Rule { kind: SymbolKind::Function, pattern: php_function() },
        ],
        "python" => vec![
            Rule { kind: SymbolKind::Class, pattern: py_class() },
            Rule { kind: SymbolKind::Function, pattern: py_def() },
        ],
        "go" => vec![
            Rule { kind: SymbolKind::Class, pattern: go_type() },
            Rule { kind: SymbolKind::Function, pattern: go_func() },
        ],
        "rust" => vec![
            Rule { kind: SymbolKind::Class, pattern: rust_struct() },
            Rule { kind: SymbolKind::Class, pattern: rust_enum() },
            Rule { kind: SymbolKind::Interface, pattern: rust_trait() },
            Rule { kind: SymbolKind::Class, pattern: rust_impl() },
            Rule { kind: SymbolKind::Function, pattern: rust_fn() },
        ],
        "ruby" => vec![
            Rule { kind: SymbolKind::Class, pattern: ruby_class() },
            Rule { kind: SymbolKind::Class, pattern: ruby_module() },
            Rule { kind: SymbolKind::Function, pattern: ruby_def() },
        ],
        "java" | "kotlin" | "csharp" | "swift" => vec![
            Rule { kind: SymbolKind::Class, pattern: java_class() },
            Rule { kind: SymbolKind::Interface, pattern: java_interface() },
            Rule { kind: SymbolKind::Method, pattern: java_method() },
        ],
        _ => vec![
            Rule { kind: SymbolKind::Class, pattern: generic_class() },
            Rule { kind: SymbolKind::Function, pattern: generic_function() },
        ],
    }
}

/// Extracts symbols from `content` for `path` given its `language` tag.
pub fn extract_symbols(path: &str, language: &str, content: &str) -> Vec<Symbol> {
    let rules = rules_for(language);
    let style = body_style_for(language);
    let lines: Vec<&str> = content.lines().collect();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for rule in &rules {
        for caps in rule.pattern.captures_iter(content) {
            let Some(name_match) = caps.get(1) else { continue };
            let name = name_match.as_str();
            if CONTROL_KEYWORDS.contains(&name) {
                continue;
            }
            if !seen_names.insert(name.to_string()) {
                continue;
            }
            let whole = caps.get(0).unwrap();
            let start_line = 1 + content[..whole.start()].matches('\n').count();
            let end_line = match style {
                BodyStyle::Brace => {
                    find_brace_end(content, whole.end(), start_line, lines.len())
                }
                BodyStyle::Indent => find_indent_end(&lines, start_line, lines.len()),
            };
            out.push(Symbol {
                file: path.to_string(),
                name: name.to_string(),
                kind: rule.kind,
                start_line,
                end_line: end_line.max(start_line),
                signature: Some(whole.as_str().trim().to_string()),
            });
        }
    }
    out
}

/// Tracks `{`/`}` balance starting from the first `{` at or after `search_from`,
/// capped at `MAX_LOOKAHEAD_LINES` lines past `start_line`.
fn find_brace_end(content: &str, search_from: usize, start_line: usize, total_lines: usize) -> usize {
    let cap_line = (start_line + MAX_LOOKAHEAD_LINES).min(total_lines.max(start_line));
    let bytes = content.as_bytes();
    let mut idx = search_from;
    while idx < bytes.len() && bytes[idx] != b'{' {
        let line_at = 1 + content[..idx].matches('\n').count();
        if line_at > cap_line {
            return cap_line;
        }
        idx += 1;
    }
    if idx >= bytes.len() {
        return start_line;
    }
    let mut depth = 0i32;
    let mut pos = idx;
    while pos < bytes.len() {
        let line_at = 1 + content[..pos].matches('\n').count();
        if line_at > cap_line {
            return cap_line;
        }
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return line_at;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    cap_line
}

/// For indentation-based languages: the body ends at the line before the next
/// non-blank line whose indentation is <= the definition line's indentation.
fn find_indent_end(lines: &[&str], start_line: usize, total_lines: usize) -> usize {
    let base_indent = indent_of(lines.get(start_line - 1).copied().unwrap_or(""));
    let cap_line = (start_line + MAX_LOOKAHEAD_LINES).min(total_lines.max(start_line));
    for (offset, line) in lines.iter().enumerate().skip(start_line) {
        let line_no = offset + 1;
        if line_no > cap_line {
            return cap_line;
        }
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= base_indent {
            return line_no - 1;
        }
    }
    total_lines.max(start_line)
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_struct_and_fn_with_brace_end() {
        let content = "pub struct Foo {\n    x: i32,\n}\n\nfn bar() {\n    let y = 1;\n}\n";
        let symbols = extract_symbols("lib.rs", "rust", content);
        let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"bar"));
        let foo = symbols.iter().find(|s| s.name == "Foo").unwrap();
        assert_eq!(foo.start_line, 1);
        assert_eq!(foo.end_line, 3);
    }

    #[test]
    fn extracts_python_class_and_def_with_indent_end() {
        let content = "class Foo:\n    def bar(self):\n        return 1\n\nclass Baz:\n    pass\n";
        let symbols = extract_symbols("a.py", "python", content);
        let foo = symbols.iter().find(|s| s.name == "Foo").unwrap();
        assert_eq!(foo.start_line, 1);
        assert_eq!(foo.end_line, 3);
        assert!(symbols.iter().any(|s| s.name == "bar"));
    }

    #[test]
    fn dedupes_same_kind_name_across_matches() {
        let content = "function run() {}\nfunction run() {}\n";
        let symbols = extract_symbols("a.js", "javascript", content);
        assert_eq!(symbols.iter().filter(|s| s.name == "run").count(), 1);
    }

    #[test]
    fn drops_control_keyword_false_positives() {
        let content = "if (x) {\n  return;\n}\n";
        let symbols = extract_symbols("a.ts", "typescript", content);
        assert!(symbols.iter().all(|s| s.name != "if"));
    }

    #[test]
    fn symbol_line_ranges_are_valid() {
        let content = "class Widget {\n  render() {\n    return 1;\n  }\n}\n";
        let symbols = extract_symbols("a.ts", "typescript", content);
        for s in &symbols {
            assert!(s.start_line <= s.end_line);
            assert!(s.start_line >= 1);
        }
    }
}
