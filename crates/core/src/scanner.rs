//! Recursive workspace traversal, language classification by extension, content
//! hashing, and `FileRecord` emission (§4.3). Unreadable files are silently
//! skipped; output order is not significant.

use std::path::Path;

use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::ignore_matcher::IgnoreMatcher;
use crate::types::{FileRecord, ScanConfig};

/// Basenames kept even though their extension maps to `unknown`.
const TEXT_ALLOW_LIST: &[&str] = &[
    "Dockerfile",
    "Makefile",
    "Rakefile",
    "Gemfile",
    "Procfile",
    "README",
    "LICENSE",
    ".gitignore",
    ".ctxignore",
];

pub fn language_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "go" => "go",
        "php" => "php",
        "rb" => "ruby",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "cs" => "csharp",
        "swift" => "swift",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "sh" | "bash" => "shell",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" => "css",
        "vue" => "vue",
        _ => "unknown",
    }
}

fn is_text_allowed(basename: &str) -> bool {
    TEXT_ALLOW_LIST.iter().any(|allowed| allowed.eq_ignore_ascii_case(basename))
}

/// Walks `config.root` in parallel (threads capped at 12, mirroring the teacher's
/// own walker cap), classifying, filtering, and hashing each candidate file.
pub fn scan(config: &ScanConfig, ignore: &IgnoreMatcher) -> Vec<FileRecord> {
    let paths: Vec<_> = WalkBuilder::new(&config.root)
        .hidden(false)
        .git_ignore(false)
        .threads(rayon::current_num_threads().min(12))
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();

    paths
        .par_iter()
        .filter_map(|path| scan_one(&config.root, path, config.max_file_size, ignore))
        .collect()
}

fn scan_one(
    root: &Path,
    path: &Path,
    max_file_size: u64,
    ignore: &IgnoreMatcher,
) -> Option<FileRecord> {
    let rel = path.strip_prefix(root).ok()?;
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    if ignore.is_ignored(&rel_str) {
        return None;
    }

    let metadata = std::fs::metadata(path).ok()?;
    let size = metadata.len();
    if size == 0 || size > max_file_size {
        return None;
    }

    let basename = path.file_name()?.to_string_lossy().to_string();
    let ext = path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default();
    let language = language_for_extension(&ext);
    if language == "unknown" && !is_text_allowed(&basename) {
        return None;
    }

    let content = std::fs::read(path).ok()?;
    if content_likely_binary(&content) {
        return None;
    }
    let content_hash = format!("{:x}", md5::compute(&content));
    let mtime_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Some(FileRecord { path: rel_str, language: language.to_string(), size, mtime_ms, content_hash })
}

/// Coarse binary sniff: a NUL byte within the first 8 KiB marks a file non-text.
fn content_likely_binary(content: &[u8]) -> bool {
    content.iter().take(8192).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn language_table_covers_common_extensions() {
        assert_eq!(language_for_extension("rs"), "rust");
        assert_eq!(language_for_extension("TS"), "typescript");
        assert_eq!(language_for_extension("weird"), "unknown");
    }

    #[test]
    fn scan_emits_record_for_small_text_file_and_skips_binary() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0u8, 1, 2, 3]).unwrap();

        let config = ScanConfig::new(PathBuf::from(dir.path()));
        let ignore = IgnoreMatcher::build(dir.path(), &[]);
        let records = scan(&config, &ignore);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "main.rs");
        assert_eq!(records[0].language, "rust");
    }

    #[test]
    fn scan_skips_empty_and_oversized_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("empty.rs"), "").unwrap();
        std::fs::write(dir.path().join("big.rs"), vec![b'a'; 200]).unwrap();

        let mut config = ScanConfig::new(PathBuf::from(dir.path()));
        config.max_file_size = 100;
        let ignore = IgnoreMatcher::build(dir.path(), &[]);
        let records = scan(&config, &ignore);
        assert!(records.is_empty());
    }

    #[test]
    fn scan_respects_ignore_matcher() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/lib.rs"), "fn f() {}\n").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let config = ScanConfig::new(PathBuf::from(dir.path()));
        let ignore = IgnoreMatcher::build(dir.path(), &["vendor/".to_string()]);
        let records = scan(&config, &ignore);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "main.rs");
    }
}
