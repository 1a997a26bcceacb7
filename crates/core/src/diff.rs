//! Wraps the VCS library to produce per-file status/add/del and changed line
//! ranges (§4.11), equivalent to `diff --name-status`, `diff --numstat`, and a
//! zero-context `diff -U0` hunk parse, but driven through `git2` rather than
//! shelling out to the version-control binary.

use std::collections::HashSet;
use std::path::Path;

use git2::{DiffOptions, Repository};
use tracing::warn;

use crate::types::{DiffEntry, DiffStatus};

/// `diff --name-status` + `--numstat` against `reference` (a ref/rev spec such
/// as `HEAD~1` or a branch name). Returns empty on any VCS failure.
pub fn diff_against(root: &Path, reference: &str) -> Vec<DiffEntry> {
    let repo = match Repository::discover(root) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    let Some(old_tree) = resolve_tree(&repo, reference) else {
        warn!(reference, "diff: could not resolve reference");
        return Vec::new();
    };
    let new_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());

    let mut opts = DiffOptions::new();
    let diff = match repo.diff_tree_to_tree(Some(&old_tree), new_tree.as_ref(), Some(&mut opts)) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "diff: diff_tree_to_tree failed");
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    let _ = diff.foreach(
        &mut |delta, _| {
            let status = match delta.status() {
                git2::Delta::Added => DiffStatus::Added,
                git2::Delta::Deleted => DiffStatus::Deleted,
                git2::Delta::Renamed => DiffStatus::Renamed,
                _ => DiffStatus::Modified,
            };
            let file = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if !file.is_empty() {
                entries.push(DiffEntry { file, status, additions: 0, deletions: 0 });
            }
            true
        },
        None,
        None,
        None,
    );

    let mut stats_index = std::collections::HashMap::new();
    for (i, e) in entries.iter().enumerate() {
        stats_index.insert(e.file.clone(), i);
    }
    let _ = diff.foreach(
        &mut |_, _| true,
        None,
        None,
        Some(&mut |delta, _hunk, line| {
            let file = delta
                .new_file()
                .path()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if let Some(&idx) = stats_index.get(&file) {
                match line.origin() {
                    '+' => entries[idx].additions += 1,
                    '-' => entries[idx].deletions += 1,
                    _ => {}
                }
            }
            true
        }),
    );

    entries
}

/// Parses the zero-context hunk headers (`@@ -a,b +c,d @@`) of the diff for
/// `file` against `reference` into the concrete set of new-side line numbers.
pub fn changed_lines(root: &Path, reference: &str, file: &str) -> HashSet<usize> {
    let repo = match Repository::discover(root) {
        Ok(r) => r,
        Err(_) => return HashSet::new(),
    };
    let Some(old_tree) = resolve_tree(&repo, reference) else { return HashSet::new() };
    let new_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());

    let mut opts = DiffOptions::new();
    opts.context_lines(0).pathspec(file);
    let diff = match repo.diff_tree_to_tree(Some(&old_tree), new_tree.as_ref(), Some(&mut opts)) {
        Ok(d) => d,
        Err(_) => return HashSet::new(),
    };

    let mut lines = HashSet::new();
    let _ = diff.foreach(
        &mut |_, _| true,
        None,
        Some(&mut |_delta, hunk| {
            let new_start = hunk.new_start() as usize;
            let new_lines = hunk.new_lines() as usize;
            for offset in 0..new_lines.max(1) {
                lines.insert(new_start + offset);
            }
            true
        }),
        None,
    );
    lines
}

fn resolve_tree<'repo>(repo: &'repo Repository, reference: &str) -> Option<git2::Tree<'repo>> {
    repo.revparse_single(reference).ok()?.peel_to_tree().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_against_on_non_repo_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(diff_against(dir.path(), "HEAD").is_empty());
    }

    #[test]
    fn changed_lines_on_non_repo_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(changed_lines(dir.path(), "HEAD", "a.rs").is_empty());
    }
}
