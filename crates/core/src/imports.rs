//! Per-language regex pass resolving project-internal imports to indexed paths (§4.5).

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::ImportEdge;

macro_rules! static_regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).expect("valid import regex"))
        }
    };
}

static_regex!(ts_import, r#"(?m)^\s*(?:import|export)[^'"]*from\s+['"]([^'"]+)['"]"#);
static_regex!(ts_require, r#"require\(\s*['"]([^'"]+)['"]\s*\)"#);
static_regex!(py_from_import, r"(?m)^\s*from\s+([\w.]+)\s+import\b");
static_regex!(py_import, r"(?m)^\s*import\s+([\w.]+)");
static_regex!(go_import, r#"(?m)^\s*(?:import\s+)?"([^"]+)"\s*$"#);
static_regex!(rust_use, r"(?m)^\s*(?:pub\s+)?use\s+([\w:]+)");
static_regex!(rust_mod, r"(?m)^\s*(?:pub\s+)?mod\s+(\w+)\s*;");
static_regex!(php_use, r"(?m)^\s*use\s+([\w\\]+)\s*;");
static_regex!(csharp_using, r"(?m)^\s*using\s+([\w.]+)\s*;");
static_regex!(cpp_include, r#"(?m)^\s*#include\s*[<"]([^>"]+)[>"]"#);
static_regex!(ruby_require, r#"require(?:_relative)?\s*\(?\s*['"]([^'"]+)['"]"#);

/// Extracts raw import specifiers from `content` for `language`, before any
/// internal/external classification or resolution.
pub fn extract_specifiers(language: &str, content: &str) -> Vec<String> {
    let mut specs = Vec::new();
    match language {
        "typescript" | "javascript" | "vue" => {
            specs.extend(ts_import().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            specs.extend(ts_require().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "python" => {
            specs.extend(py_from_import().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            specs.extend(py_import().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "go" => {
            specs.extend(go_import().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "rust" => {
            specs.extend(rust_use().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            specs.extend(rust_mod().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "php" => {
            specs.extend(php_use().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "csharp" => {
            specs.extend(csharp_using().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "c" | "cpp" => {
            specs.extend(cpp_include().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        "ruby" => {
            specs.extend(ruby_require().captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
        }
        _ => {}
    }
    specs
}

fn is_internal(language: &str, spec: &str) -> bool {
    match language {
        "typescript" | "javascript" | "vue" => {
            spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/') || spec.starts_with('@')
        }
        "php" => !spec.starts_with("Illuminate\\") && !spec.starts_with("Symfony\\") && !spec.starts_with("PHPUnit\\"),
        "python" => {
            const BUILTINS: &[&str] = &["os", "sys", "json", "re", "typing", "collections", "itertools", "math", "datetime"];
            !BUILTINS.contains(&spec.split('.').next().unwrap_or(spec))
        }
        "go" => !spec.starts_with("github.com/") && !spec.contains('.'),
        "rust" => !(spec.starts_with("std") || spec.starts_with("core") || spec.starts_with("alloc")),
        "ruby" => !matches!(spec, "json" | "set" | "time" | "net/http" | "uri" | "fileutils"),
        "csharp" | "java" | "kotlin" | "swift" => {
            !(spec.starts_with("java.") || spec.starts_with("javax.") || spec.starts_with("System") || spec.starts_with("Microsoft."))
        }
        _ => false,
    }
}

/// Converts a namespace-style specifier into path shape, e.g. PHP
/// `App\Http\Controllers\X` -> `app/Http/Controllers/X`, Python dots -> slashes,
/// Rust `crate::foo::Bar` -> `foo/Bar`.
fn to_path_shape(language: &str, spec: &str) -> String {
    match language {
        "php" => {
            let mut parts: Vec<String> = spec.split('\\').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect();
            if let Some(first) = parts.first_mut() {
                *first = first.to_lowercase();
            }
            parts.join("/")
        }
        "python" => spec.replace('.', "/"),
        "rust" => {
            let stripped = spec
                .strip_prefix("crate::")
                .or_else(|| spec.strip_prefix("self::"))
                .unwrap_or(spec);
            stripped.replace("::", "/")
        }
        "csharp" | "java" | "kotlin" => spec.replace('.', "/"),
        _ => spec.to_string(),
    }
}

const LANG_EXTENSIONS: &[(&str, &[&str])] = &[
    ("typescript", &["ts", "tsx", "js", "jsx"]),
    ("javascript", &["js", "jsx", "ts", "tsx"]),
    ("vue", &["vue", "ts", "js"]),
    ("python", &["py"]),
    ("go", &["go"]),
    ("rust", &["rs"]),
    ("php", &["php"]),
    ("ruby", &["rb"]),
    ("csharp", &["cs"]),
    ("java", &["java"]),
    ("kotlin", &["kt"]),
    ("c", &["c", "h"]),
    ("cpp", &["cpp", "cc", "hpp", "h"]),
];

fn extensions_for(language: &str) -> &'static [&'static str] {
    LANG_EXTENSIONS.iter().find(|(l, _)| *l == language).map(|(_, e)| *e).unwrap_or(&[])
}

/// Joins a `./`/`../`-relative specifier against the directory of `source_path`,
/// collapsing `..` segments. Specifiers that aren't relative (namespace-style,
/// package-style, root-absolute) pass through unchanged.
fn join_relative(source_path: &str, spec: &str) -> String {
    if !spec.starts_with("./") && !spec.starts_with("../") {
        return spec.to_string();
    }
    let dir = match source_path.rfind('/') {
        Some(i) => &source_path[..i],
        None => "",
    };
    let mut stack: Vec<&str> = if dir.is_empty() { Vec::new() } else { dir.split('/').collect() };
    for part in spec.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            seg => stack.push(seg),
        }
    }
    stack.join("/")
}

/// Resolves an internal specifier in path-shape against the indexed path set,
/// trying extension fallbacks and index-file conventions (`/index.*`, `/mod.rs`,
/// `/__init__.py`).
fn resolve_against_index(language: &str, path_shape: &str, indexed: &HashSet<String>) -> Option<String> {
    let candidate = path_shape.trim_start_matches('/').trim_start_matches("./");
    if indexed.contains(candidate) {
        return Some(candidate.to_string());
    }
    for ext in extensions_for(language) {
        let with_ext = format!("{candidate}.{ext}");
        if indexed.contains(&with_ext) {
            return Some(with_ext);
        }
    }
    for ext in extensions_for(language) {
        let idx = format!("{candidate}/index.{ext}");
        if indexed.contains(&idx) {
            return Some(idx);
        }
    }
    if language == "rust" {
        let mod_rs = format!("{candidate}/mod.rs");
        if indexed.contains(&mod_rs) {
            return Some(mod_rs);
        }
        let sibling_rs = format!("{candidate}.rs");
        if indexed.contains(&sibling_rs) {
            return Some(sibling_rs);
        }
    }
    if language == "python" {
        let init_py = format!("{candidate}/__init__.py");
        if indexed.contains(&init_py) {
            return Some(init_py);
        }
    }
    None
}

/// Extracts, classifies, resolves, and de-duplicates import edges originating
/// from `source_path`. Unresolved or external specifiers are dropped.
pub fn build_edges(
    source_path: &str,
    language: &str,
    content: &str,
    indexed: &HashSet<String>,
) -> Vec<ImportEdge> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for spec in extract_specifiers(language, content) {
        if !is_internal(language, &spec) {
            continue;
        }
        let joined = join_relative(source_path, &spec);
        let path_shape = to_path_shape(language, &joined);
        let Some(target) = resolve_against_index(language, &path_shape, indexed) else { continue };
        if target == source_path {
            continue;
        }
        if seen.insert(target.clone()) {
            edges.push(ImportEdge { source: source_path.to_string(), target, symbol: None });
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn resolves_relative_ts_import_with_extension_fallback() {
        let content = "import { Foo } from './bar';\n";
        let indexed = idx(&["src/bar.ts", "src/main.ts"]);
        let edges = build_edges("src/main.ts", "typescript", content, &indexed);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "src/bar.ts");
    }

    #[test]
    fn resolves_parent_relative_ts_import() {
        let content = "import { Foo } from '../shared/bar';\n";
        let indexed = idx(&["src/shared/bar.ts", "src/nested/main.ts"]);
        let edges = build_edges("src/nested/main.ts", "typescript", content, &indexed);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "src/shared/bar.ts");
    }

    #[test]
    fn drops_external_ts_import() {
        let content = "import React from 'react';\n";
        let indexed = idx(&["src/main.ts"]);
        let edges = build_edges("src/main.ts", "typescript", content, &indexed);
        assert!(edges.is_empty());
    }

    #[test]
    fn resolves_python_dotted_import_to_slash_path() {
        let content = "from app.services import user\n";
        let indexed = idx(&["app/services/__init__.py"]);
        let edges = build_edges("app/main.py", "python", content, &indexed);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "app/services/__init__.py");
    }

    #[test]
    fn resolves_php_namespace_to_app_path() {
        let content = "use App\\Http\\Controllers\\UserController;\n";
        let indexed = idx(&["app/Http/Controllers/UserController.php"]);
        let edges = build_edges("app/Http/routes.php", "php", content, &indexed);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "app/Http/Controllers/UserController.php");
    }

    #[test]
    fn dedupes_duplicate_specifiers_per_source_file() {
        let content = "import './bar';\nimport './bar';\n";
        let indexed = idx(&["bar.ts"]);
        let edges = build_edges("main.ts", "typescript", content, &indexed);
        assert_eq!(edges.len(), 1);
    }
}
