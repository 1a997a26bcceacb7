//! Batch commit-churn hotspots and per-file commit count / last-modified (§4.6).
//! Best-effort: any git2 failure degrades to an empty signal set rather than
//! propagating, since VCS availability is optional per §1/§7.

use std::collections::HashMap;
use std::path::Path;

use chrono::{TimeZone, Utc};
use git2::{Repository, Sort};
use tracing::warn;

use crate::types::VcsSignal;

const LOOKBACK_DAYS: i64 = 182; // ~6 months

/// Enumerates commit counts per file over the last 6 months and derives
/// `churnScore = count / max(count)` for every touched file.
pub fn hot_files(root: &Path) -> HashMap<String, VcsSignal> {
    let repo = match Repository::discover(root) {
        Ok(r) => r,
        Err(_) => return HashMap::new(),
    };

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut last_modified: HashMap<String, String> = HashMap::new();

    let cutoff = Utc::now().timestamp() - LOOKBACK_DAYS * 86_400;

    let mut revwalk = match repo.revwalk() {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "vcs: failed to create revwalk");
            return HashMap::new();
        }
    };
    if revwalk.push_head().is_err() {
        return HashMap::new();
    }
    let _ = revwalk.set_sorting(Sort::TIME);

    for oid in revwalk.flatten() {
        let Ok(commit) = repo.find_commit(oid) else { continue };
        if commit.time().seconds() < cutoff {
            break;
        }
        let Ok(tree) = commit.tree() else { continue };
        let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
        let Ok(diff) = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None) else {
            continue;
        };
        let commit_iso = format_commit_time(commit.time().seconds());
        let _ = diff.foreach(
            &mut |delta, _| {
                if let Some(path) = delta.new_file().path().map(|p| p.to_string_lossy().replace('\\', "/")) {
                    *counts.entry(path.clone()).or_insert(0) += 1;
                    last_modified.entry(path).or_insert_with(|| commit_iso.clone());
                }
                true
            },
            None,
            None,
            None,
        );
    }

    let max_count = counts.values().copied().max().unwrap_or(1).max(1);
    counts
        .into_iter()
        .map(|(path, count)| {
            let signal = VcsSignal {
                last_modified: last_modified.remove(&path),
                commit_count: count,
                churn_score: count as f64 / max_count as f64,
            };
            (path, signal)
        })
        .collect()
}

/// Per-file commit count and last-modified, for files not covered by `hot_files`'
/// 6-month window (e.g. a cold file queried directly).
pub fn file_history(root: &Path, rel_path: &str) -> Option<VcsSignal> {
    let repo = Repository::discover(root).ok()?;
    let mut revwalk = repo.revwalk().ok()?;
    revwalk.push_head().ok()?;
    let _ = revwalk.set_sorting(Sort::TIME);

    let mut count = 0usize;
    let mut last_modified = None;
    for oid in revwalk.flatten() {
        let Ok(commit) = repo.find_commit(oid) else { continue };
        let Ok(tree) = commit.tree() else { continue };
        let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
        let Ok(diff) = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None) else {
            continue;
        };
        let mut touched = false;
        let _ = diff.foreach(
            &mut |delta, _| {
                if delta.new_file().path().map(|p| p.to_string_lossy().replace('\\', "/")) == Some(rel_path.to_string()) {
                    touched = true;
                }
                true
            },
            None,
            None,
            None,
        );
        if touched {
            count += 1;
            if last_modified.is_none() {
                last_modified = Some(format_commit_time(commit.time().seconds()));
            }
        }
    }
    if count == 0 {
        return None;
    }
    Some(VcsSignal { last_modified, commit_count: count, churn_score: 0.0 })
}

fn format_commit_time(epoch_seconds: i64) -> String {
    Utc.timestamp_opt(epoch_seconds, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_files_on_non_repo_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let signals = hot_files(dir.path());
        assert!(signals.is_empty());
    }

    #[test]
    fn file_history_on_non_repo_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_history(dir.path(), "a.rs").is_none());
    }
}
