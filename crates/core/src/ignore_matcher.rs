//! Gitignore-semantics matcher composed from an essential, non-overridable block,
//! the user's `.ctxignore`, and blocks contributed by matched project rules (§4.2).

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Path segments that are always excluded, regardless of user or rule configuration.
pub const ESSENTIAL_SEGMENTS: &[&str] =
    &[".git", ".context", "node_modules", ".DS_Store", "Thumbs.db"];

/// Suffixes treated as OS/editor cruft wherever they appear.
const ESSENTIAL_SUFFIXES: &[&str] = &[".swp", ".swo", "~"];

pub struct IgnoreMatcher {
    gitignore: Gitignore,
}

impl IgnoreMatcher {
    /// Builds a matcher from an ordered concatenation of pattern blocks: the
    /// essential block, then `.ctxignore` content (if any), then each matched
    /// rule's ignore block, in that order (later blocks can negate earlier ones
    /// via `!pattern`, per gitignore semantics).
    pub fn build(root: &std::path::Path, blocks: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for segment in ESSENTIAL_SEGMENTS {
            let _ = builder.add_line(None, segment);
        }
        for block in blocks {
            for line in block.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                let _ = builder.add_line(None, trimmed);
            }
        }
        let gitignore = builder.build().unwrap_or_else(|_| Gitignore::empty());
        IgnoreMatcher { gitignore }
    }

    /// `relPath` is normalised to forward slashes before the test.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let normalized = rel_path.replace('\\', "/");
        if ESSENTIAL_SUFFIXES.iter().any(|suf| normalized.ends_with(suf)) {
            return true;
        }
        if normalized.split('/').any(|seg| ESSENTIAL_SEGMENTS.contains(&seg)) {
            return true;
        }
        self.gitignore.matched(&normalized, normalized.ends_with('/')).is_ignore()
    }

    pub fn filter<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        paths.into_iter().filter(|p| !self.is_ignored(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn essential_segments_always_ignored_even_without_blocks() {
        let matcher = IgnoreMatcher::build(Path::new("."), &[]);
        assert!(matcher.is_ignored(".git/HEAD"));
        assert!(matcher.is_ignored("node_modules/leftpad/index.js"));
    }

    #[test]
    fn user_block_excludes_matching_paths() {
        let matcher =
            IgnoreMatcher::build(Path::new("."), &["dist/\n*.log".to_string()]);
        assert!(matcher.is_ignored("dist/bundle.js"));
        assert!(matcher.is_ignored("debug.log"));
        assert!(!matcher.is_ignored("src/main.rs"));
    }

    #[test]
    fn negation_in_later_block_overrides_earlier_block() {
        let blocks =
            vec!["*.generated.*".to_string(), "!keep.generated.ts".to_string()];
        let matcher = IgnoreMatcher::build(Path::new("."), &blocks);
        assert!(matcher.is_ignored("foo.generated.ts"));
        assert!(!matcher.is_ignored("keep.generated.ts"));
    }

    #[test]
    fn filter_drops_ignored_paths() {
        let matcher = IgnoreMatcher::build(Path::new("."), &["*.log".to_string()]);
        let kept = matcher.filter(vec!["a.rs", "b.log", "c.rs"]);
        assert_eq!(kept, vec!["a.rs", "c.rs"]);
    }
}
