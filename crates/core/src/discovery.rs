//! Runs all signal producers and two-hop reference expansion, producing
//! `map<path, CandidateSignals>` (§4.13).
//!
//! The six primary producers (stacktrace, diff, symbols, keywords-via-FTS, file
//! hints, filenames/paths) run concurrently against a shared `DashMap`, guarded
//! by its per-key atomic entry API rather than a hand-rolled mutex. Graph BFS,
//! two-hop expansion, test-file pairing, and rule discoveries run afterward,
//! in that order, each OR-merging into the same map.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use dashmap::DashMap;
use rayon::prelude::*;
use regex::Regex;

use crate::rules::RuleRegistry;
use crate::store::Store;
use crate::types::{CandidateSignals, DiffEntry, DiffStatus, ResolvedTask, StacktraceResult};

const MAX_BFS_DEPTH: usize = 2;
const MAX_BFS_NODES: usize = 100;
const TOP_KEYWORD_QUERIES: usize = 30;
const FTS_HITS_PER_QUERY: usize = 20;
const MIN_TERM_LEN: usize = 3;
/// Churn score above which an already-discovered candidate is annotated as a
/// hotspot (upper tail of recent commit churn, per the glossary's definition).
const GIT_HOTSPOT_CHURN_THRESHOLD: f64 = 0.6;
const EXAMPLE_PATH_MARKERS: &[&str] = &["example", "demo", "sample"];

fn merge_into(map: &DashMap<String, CandidateSignals>, path: &str, f: impl FnOnce(&mut CandidateSignals)) {
    let mut signal = CandidateSignals::default();
    f(&mut signal);
    map.entry(path.to_string()).or_default().merge(&signal);
}

/// Fan out the six primary producers concurrently, then run BFS, two-hop
/// expansion, test-file pairing, rule discoveries, and the ignore filter in order.
pub fn discover(
    store: &Store,
    task: &ResolvedTask,
    stacktrace: &StacktraceResult,
    diff_entries: &[DiffEntry],
    registry: &RuleRegistry,
    churn_scores: &HashMap<String, f64>,
    ignored: impl Fn(&str) -> bool,
) -> Vec<(String, CandidateSignals)> {
    let all_files = store.get_all_files().unwrap_or_default();
    let all_paths: Vec<String> = all_files.iter().map(|f| f.path.clone()).collect();
    let path_set: HashSet<&str> = all_paths.iter().map(|p| p.as_str()).collect();

    let map: DashMap<String, CandidateSignals> = DashMap::new();

    rayon::scope(|s| {
        s.spawn(|_| producer_stacktrace(&map, stacktrace, &path_set));
        s.spawn(|_| producer_diff(&map, diff_entries));
        s.spawn(|_| producer_symbols(&map, store, task));
        s.spawn(|_| producer_keywords(&map, store, task));
        s.spawn(|_| producer_file_hints(&map, task, &path_set));
        s.spawn(|_| producer_filenames(&map, task, &all_paths));
    });

    graph_bfs(&map, store, &path_set);
    two_hop_expansion(&map, store, &path_set);
    test_file_pairing(&map, store, &all_paths);

    for (path, signals) in registry.discover_all(&all_paths) {
        map.entry(path).or_default().merge(&signals);
    }

    mark_git_hotspots(&map, churn_scores);
    mark_example_usage(&map);

    map.into_iter().filter(|(path, _)| !ignored(path)).collect()
}

/// Annotates already-discovered candidates in the upper tail of recent commit
/// churn as `git_hotspot`. Does not introduce new candidates on its own —
/// churn alone isn't one of the six primary producers, only a tiebreaker on
/// files surfaced some other way.
fn mark_git_hotspots(map: &DashMap<String, CandidateSignals>, churn_scores: &HashMap<String, f64>) {
    for (path, churn) in churn_scores {
        if *churn >= GIT_HOTSPOT_CHURN_THRESHOLD {
            if let Some(mut entry) = map.get_mut(path) {
                entry.git_hotspot = true;
            }
        }
    }
}

/// Annotates already-discovered candidates under an example/demo/sample path
/// that also carry a symbol or keyword match as `example_usage`.
fn mark_example_usage(map: &DashMap<String, CandidateSignals>) {
    let hits: Vec<String> = map
        .iter()
        .filter(|entry| {
            let lower = entry.key().to_lowercase();
            EXAMPLE_PATH_MARKERS.iter().any(|m| lower.contains(m))
                && (entry.value().symbol_match || entry.value().exact_symbol_mention || entry.value().keyword_match)
        })
        .map(|entry| entry.key().clone())
        .collect();
    for path in hits {
        if let Some(mut entry) = map.get_mut(&path) {
            entry.example_usage = true;
        }
    }
}

fn producer_stacktrace(map: &DashMap<String, CandidateSignals>, stacktrace: &StacktraceResult, path_set: &HashSet<&str>) {
    for frame in &stacktrace.frames {
        if path_set.contains(frame.file.as_str()) {
            merge_into(map, &frame.file, |s| s.stacktrace_hit = true);
        } else if let Some(hit) = path_set.iter().find(|p| p.ends_with(frame.file.as_str()) || frame.file.ends_with(**p)) {
            merge_into(map, hit, |s| s.stacktrace_hit = true);
        }
    }
}

fn producer_diff(map: &DashMap<String, CandidateSignals>, diff_entries: &[DiffEntry]) {
    for entry in diff_entries {
        if entry.status == DiffStatus::Deleted {
            continue;
        }
        merge_into(map, &entry.file, |s| s.diff_hit = true);
    }
}

fn producer_symbols(map: &DashMap<String, CandidateSignals>, store: &Store, task: &ResolvedTask) {
    let mut names: Vec<&str> = task.symbol_hints.iter().map(|s| s.as_str()).collect();
    names.extend(task.entities.classes.iter().map(|e| e.original.as_str()));
    names.extend(task.entities.methods.iter().map(|e| e.original.as_str()));
    for name in names {
        if name.len() < MIN_TERM_LEN {
            continue;
        }
        let Ok(hits) = store.find_symbols_by_name(name) else { continue };
        for symbol in hits {
            merge_into(map, &symbol.file, |s| {
                s.symbol_match = true;
                s.exact_symbol_mention = true;
            });
        }
    }
}

fn producer_keywords(map: &DashMap<String, CandidateSignals>, store: &Store, task: &ResolvedTask) {
    for keyword in task.keywords.iter().take(TOP_KEYWORD_QUERIES) {
        let Ok(hits) = store.search_content(keyword, FTS_HITS_PER_QUERY) else { continue };
        for (path, _rank) in hits {
            merge_into(map, &path, |s| s.keyword_match = true);
        }
    }
}

fn producer_file_hints(map: &DashMap<String, CandidateSignals>, task: &ResolvedTask, path_set: &HashSet<&str>) {
    for hint in &task.file_hints {
        let normalized = hint.trim_start_matches('@').trim_start_matches("./");
        if path_set.contains(normalized) {
            merge_into(map, normalized, |s| s.file_hint_exact = true);
            continue;
        }
        let hint_basename = basename(normalized);
        for path in path_set.iter() {
            if basename(path).contains(hint_basename) || hint_basename.contains(basename(path)) {
                merge_into(map, path, |s| s.file_hint_hit = true);
            }
        }
    }
}

fn producer_filenames(map: &DashMap<String, CandidateSignals>, task: &ResolvedTask, all_paths: &[String]) {
    let mut terms: Vec<String> = Vec::new();
    terms.extend(task.entities.classes.iter().map(|e| e.original.to_lowercase()));
    terms.extend(task.entities.methods.iter().map(|e| e.original.to_lowercase()));
    terms.extend(task.keywords.iter().cloned());
    terms.extend(task.domains.iter().cloned());
    terms.retain(|t| t.len() >= MIN_TERM_LEN);
    terms.sort();
    terms.dedup();

    for path in all_paths {
        let lower_path = path.to_lowercase();
        let stem = file_stem(&lower_path);
        let base = basename(&lower_path);
        let mut raw_path_matches = 0usize;
        let mut filename_matches = 0usize;
        let mut basename_matches = 0usize;
        for term in &terms {
            if lower_path.contains(term.as_str()) {
                raw_path_matches += 1;
            }
            if base.contains(term.as_str()) {
                filename_matches += 1;
            }
            if stem == term.as_str() {
                basename_matches += 1;
            }
        }
        if raw_path_matches > 0 || filename_matches > 0 || basename_matches > 0 {
            merge_into(map, path, |s| {
                s.symbol_match = true;
                s.raw_path_match_count = raw_path_matches;
                s.filename_match_count = filename_matches;
                s.basename_match_count = basename_matches;
            });
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn file_stem(path: &str) -> &str {
    let base = basename(path);
    base.split('.').next().unwrap_or(base)
}

/// Breadth-first in both directions over `ImportEdge`, max depth 2, max 100
/// visited nodes. Seeds are files with any of {stacktrace, diff, symbol,
/// exactSymbolMention}; if none, every current candidate seeds the search.
fn graph_bfs(map: &DashMap<String, CandidateSignals>, store: &Store, path_set: &HashSet<&str>) {
    let strong_seeds: Vec<String> = map
        .iter()
        .filter(|entry| {
            let s = entry.value();
            s.stacktrace_hit || s.diff_hit || s.symbol_match || s.exact_symbol_mention
        })
        .map(|entry| entry.key().clone())
        .collect();
    let seeds: Vec<String> = if !strong_seeds.is_empty() {
        strong_seeds
    } else {
        map.iter().map(|entry| entry.key().clone()).collect()
    };
    if seeds.is_empty() {
        return;
    }

    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut queue: VecDeque<(String, usize)> = seeds.into_iter().map(|p| (p, 0)).collect();

    while let Some((path, depth)) = queue.pop_front() {
        if depth >= MAX_BFS_DEPTH || visited.len() >= MAX_BFS_NODES {
            continue;
        }
        let mut neighbors: Vec<String> = store.get_imports_from(&path).unwrap_or_default().into_iter().map(|e| e.target).collect();
        neighbors.extend(store.get_importers_of(&path).unwrap_or_default().into_iter().map(|e| e.source));

        for neighbor in neighbors {
            if !path_set.contains(neighbor.as_str()) {
                continue;
            }
            let next_depth = depth + 1;
            if visited.len() >= MAX_BFS_NODES {
                break;
            }
            merge_into(map, &neighbor, |s| {
                s.graph_related = true;
                s.graph_depth = Some(next_depth);
                s.graph_decay = 1.0 / next_depth as f64;
            });
            if visited.insert(neighbor.clone()) {
                queue.push_back((neighbor, next_depth));
            }
        }
    }
}

static PASCAL_REF: OnceLock<Regex> = OnceLock::new();
static METHOD_REF: OnceLock<Regex> = OnceLock::new();
static FUNCTION_DECL_REF: OnceLock<Regex> = OnceLock::new();
static BACKTICK_CALL_REF: OnceLock<Regex> = OnceLock::new();
static LARAVEL_STRING_CALLABLE_REF: OnceLock<Regex> = OnceLock::new();
static LARAVEL_ARRAY_CALLABLE_REF: OnceLock<Regex> = OnceLock::new();
static FILE_REF: OnceLock<Regex> = OnceLock::new();

fn pascal_ref() -> &'static Regex {
    PASCAL_REF.get_or_init(|| Regex::new(r"\b([A-Z][A-Za-z0-9_]*(?:Controller|Service|Repository|Model|Handler|Factory|Middleware)?)\b").unwrap())
}
/// `->m(` / `::m(`.
fn method_ref() -> &'static Regex {
    METHOD_REF.get_or_init(|| Regex::new(r"(?:->|::)\s*([a-zA-Z_]\w*)\s*\(").unwrap())
}
/// `function m(`.
fn function_decl_ref() -> &'static Regex {
    FUNCTION_DECL_REF.get_or_init(|| Regex::new(r"\bfunction\s+([a-zA-Z_]\w*)\s*\(").unwrap())
}
/// Backtick-quoted call references, e.g. `` `m()` ``.
fn backtick_call_ref() -> &'static Regex {
    BACKTICK_CALL_REF.get_or_init(|| Regex::new(r"`([a-zA-Z_]\w*)\(\)`").unwrap())
}
/// Laravel string-callable routes, e.g. `'action' => 'm'`.
fn laravel_string_callable_ref() -> &'static Regex {
    LARAVEL_STRING_CALLABLE_REF
        .get_or_init(|| Regex::new(r#"'action'\s*=>\s*['"]([a-zA-Z_]\w*)['"]"#).unwrap())
}
/// Laravel array-callable references, e.g. `[X::class, 'm']`.
fn laravel_array_callable_ref() -> &'static Regex {
    LARAVEL_ARRAY_CALLABLE_REF
        .get_or_init(|| Regex::new(r#"::class\s*,\s*['"]([a-zA-Z_]\w*)['"]"#).unwrap())
}
fn file_ref() -> &'static Regex {
    FILE_REF.get_or_init(|| Regex::new(r"[\w./-]+\.(?:ts|tsx|js|jsx|py|php|rb|go|rs|java|kt|cs)").unwrap())
}

/// Reads each initial candidate's content and resolves class/method/file
/// references found in the text back to indexed paths; each resolved file
/// receives `related_file`.
fn two_hop_expansion(map: &DashMap<String, CandidateSignals>, store: &Store, path_set: &HashSet<&str>) {
    let initial: Vec<String> = map.iter().map(|e| e.key().clone()).collect();
    let discovered: Vec<(String, String)> = initial
        .par_iter()
        .filter_map(|path| {
            let content = store.get_content(path).ok().flatten()?;
            Some((path.clone(), content))
        })
        .flat_map(|(path, content)| {
            let mut refs: HashSet<String> = HashSet::new();
            refs.extend(pascal_ref().find_iter(&content).map(|m| m.as_str().to_string()));
            refs.extend(method_ref().captures_iter(&content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            refs.extend(function_decl_ref().captures_iter(&content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            refs.extend(backtick_call_ref().captures_iter(&content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            refs.extend(laravel_string_callable_ref().captures_iter(&content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            refs.extend(laravel_array_callable_ref().captures_iter(&content).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()));
            refs.extend(file_ref().find_iter(&content).map(|m| m.as_str().to_string()));

            let mut hits = Vec::new();
            for r in refs {
                for candidate in path_set.iter() {
                    if candidate.ends_with(r.as_str()) || basename(candidate) == r || file_stem(candidate) == r.to_lowercase() {
                        hits.push((path.clone(), candidate.to_string()));
                    }
                }
            }
            hits
        })
        .collect();

    for (_source, target) in discovered {
        merge_into(map, &target, |s| s.related_file = true);
    }
}

fn normalize_test_name(path: &str) -> String {
    let lower = file_stem(path).to_lowercase();
    lower
        .replace("__tests__", "")
        .replace(".test", "")
        .replace(".spec", "")
        .replace("test_", "")
        .replace("_test", "")
        .replace("spec_", "")
        .replace("_spec", "")
        .trim_start_matches("test")
        .to_string()
}

fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.contains("__tests__") || lower.contains("/test/") || lower.contains("/spec/")
        || lower.contains(".test.") || lower.contains(".spec.") || lower.contains("_test.")
        || lower.contains("test_")
}

/// Any file matching a test-path pattern whose normalised basename maps to an
/// existing candidate's basename is paired in as `test_file`.
fn test_file_pairing(map: &DashMap<String, CandidateSignals>, _store: &Store, all_paths: &[String]) {
    let candidate_stems: HashSet<String> =
        map.iter().map(|e| file_stem(&e.key().to_lowercase()).to_string()).collect();

    for path in all_paths {
        if !is_test_path(path) {
            continue;
        }
        let normalized = normalize_test_name(path);
        if candidate_stems.iter().any(|c| c == &normalized || c.contains(&normalized) || normalized.contains(c.as_str())) {
            merge_into(map, path, |s| s.test_file = true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileRecord, StackFrame};

    fn file(path: &str) -> FileRecord {
        FileRecord { path: path.to_string(), language: "rust".into(), size: 10, mtime_ms: 0, content_hash: "x".into() }
    }

    #[test]
    fn stacktrace_producer_sets_signal_on_exact_match() {
        let map = DashMap::new();
        let path_set: HashSet<&str> = ["app/a.rs"].into_iter().collect();
        let trace = StacktraceResult {
            frames: vec![StackFrame { file: "app/a.rs".into(), line: 1, column: None, function: None }],
            message: None,
        };
        producer_stacktrace(&map, &trace, &path_set);
        assert!(map.get("app/a.rs").unwrap().stacktrace_hit);
    }

    #[test]
    fn diff_producer_skips_deleted_files() {
        let map = DashMap::new();
        let entries = vec![
            DiffEntry { file: "kept.rs".into(), status: DiffStatus::Modified, additions: 1, deletions: 0 },
            DiffEntry { file: "gone.rs".into(), status: DiffStatus::Deleted, additions: 0, deletions: 5 },
        ];
        producer_diff(&map, &entries);
        assert!(map.get("kept.rs").unwrap().diff_hit);
        assert!(map.get("gone.rs").is_none());
    }

    #[test]
    fn graph_bfs_respects_max_depth() {
        let store = Store::open_in_memory().unwrap();
        for p in ["a.rs", "b.rs", "c.rs"] {
            store.upsert_file(&file(p)).unwrap();
        }
        store
            .insert_import(&crate::types::ImportEdge { source: "a.rs".into(), target: "b.rs".into(), symbol: None })
            .unwrap();
        store
            .insert_import(&crate::types::ImportEdge { source: "b.rs".into(), target: "c.rs".into(), symbol: None })
            .unwrap();

        let map = DashMap::new();
        map.insert("a.rs".to_string(), CandidateSignals { stacktrace_hit: true, ..Default::default() });
        let all_paths = vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()];
        let path_set: HashSet<&str> = all_paths.iter().map(|p| p.as_str()).collect();
        graph_bfs(&map, &store, &path_set);

        assert_eq!(map.get("b.rs").unwrap().graph_depth, Some(1));
        assert_eq!(map.get("c.rs").unwrap().graph_depth, Some(2));
    }

    #[test]
    fn test_file_pairing_matches_normalized_names() {
        let map = DashMap::new();
        map.insert("src/user.ts".to_string(), CandidateSignals::default());
        let all_paths = vec!["src/user.ts".to_string(), "src/user.test.ts".to_string()];
        test_file_pairing(&map, &Store::open_in_memory().unwrap(), &all_paths);
        assert!(map.get("src/user.test.ts").unwrap().test_file);
    }

    #[test]
    fn git_hotspot_annotates_existing_candidates_only() {
        let map = DashMap::new();
        map.insert("src/hot.rs".to_string(), CandidateSignals { keyword_match: true, ..Default::default() });
        let mut churn = HashMap::new();
        churn.insert("src/hot.rs".to_string(), 0.9);
        churn.insert("src/untouched.rs".to_string(), 0.9);
        mark_git_hotspots(&map, &churn);
        assert!(map.get("src/hot.rs").unwrap().git_hotspot);
        assert!(map.get("src/untouched.rs").is_none());
    }

    #[test]
    fn example_usage_requires_path_marker_and_existing_signal() {
        let map = DashMap::new();
        map.insert("examples/basic.rs".to_string(), CandidateSignals { symbol_match: true, ..Default::default() });
        map.insert("examples/unrelated.rs".to_string(), CandidateSignals::default());
        mark_example_usage(&map);
        assert!(map.get("examples/basic.rs").unwrap().example_usage);
        assert!(!map.get("examples/unrelated.rs").unwrap().example_usage);
    }

    #[test]
    fn method_reference_patterns_cover_all_named_idioms() {
        assert_eq!(
            method_ref().captures_iter("$this->store(").filter_map(|c| c.get(1).map(|m| m.as_str().to_string())).collect::<Vec<_>>(),
            vec!["store".to_string()]
        );
        assert_eq!(
            function_decl_ref()
                .captures_iter("function store() {}")
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>(),
            vec!["store".to_string()]
        );
        assert_eq!(
            backtick_call_ref()
                .captures_iter("see `store()` for details")
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>(),
            vec!["store".to_string()]
        );
        assert_eq!(
            laravel_string_callable_ref()
                .captures_iter("'action' => 'store'")
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>(),
            vec!["store".to_string()]
        );
        assert_eq!(
            laravel_array_callable_ref()
                .captures_iter("[UserController::class, 'store']")
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>(),
            vec!["store".to_string()]
        );
    }
}
