//! Task Resolver façade: composes the Keyword Extractor, Stacktrace Parser,
//! Diff Analyzer, and Domain/Rule Registry into a `ResolvedTask`, then wires
//! Discovery → Scorer → Excerpt Extractor end to end for a single invocation.

use std::collections::HashMap;
use std::path::Path;

use crate::discovery;
use crate::excerpt::{self, DEFAULT_MAX_LINES_PER_FILE, DEFAULT_SMALL_FILE_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::ignore_matcher::IgnoreMatcher;
use crate::keywords;
use crate::rules::RuleRegistry;
use crate::scorer::{self, DEFAULT_MAX_FILES};
use crate::stacktrace;
use crate::stemmer::SynonymEngine;
use crate::store::Store;
use crate::types::{Candidate, ChangeType, Confidence, DiffEntry, Domain, Excerpt, ResolvedTask, StacktraceResult};
use crate::diff;
use crate::vcs;

/// Raw inputs a caller assembles from CLI flags before resolving a task.
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub text: String,
    pub stacktrace_text: Option<String>,
    pub since: Option<String>,
    pub diff_ref: Option<String>,
    pub file_hints: Vec<String>,
    pub symbol_hints: Vec<String>,
}

/// Everything the façade hands back to an external renderer for one invocation.
pub struct PackResult {
    pub task: ResolvedTask,
    pub candidates: Vec<Candidate>,
    pub excerpts: Vec<Excerpt>,
    pub diff_entries: Vec<DiffEntry>,
}

/// Builds a `ResolvedTask` from raw CLI-level input plus the active domain list
/// (already filtered through any project domain overrides).
pub fn resolve_task(input: &TaskInput, domains: &[Domain], now_epoch_secs: i64) -> (ResolvedTask, StacktraceResult, Vec<DiffEntry>) {
    let raw_words = keywords::tokenize_raw_words(&input.text);
    let entities = keywords::extract_entities(&input.text);
    let base_keywords = keywords::tfidf_keywords(&raw_words);
    let keyphrases = keywords::rake_keyphrases(&input.text);

    let synonyms = SynonymEngine::default();
    let keyphrase_words: Vec<String> =
        keyphrases.iter().flat_map(|p| p.split_whitespace().map(|s| s.to_string())).collect();
    let mut expanded: Vec<String> = Vec::new();
    for word in base_keywords.iter().chain(keyphrase_words.iter()) {
        expanded.extend(synonyms.expand(word));
    }
    let mut keywords_final: Vec<String> = base_keywords.iter().cloned().chain(expanded).collect();
    keywords_final.sort();
    keywords_final.dedup();

    let (domains, domain_weights) = keywords::detect_domains(&keywords_final, domains);
    let change_type = keywords::detect_change_type(&raw_words);

    let stacktrace_text = input.stacktrace_text.as_deref().unwrap_or("");
    let filtered = match &input.since {
        Some(since) => stacktrace::filter_since(stacktrace_text, since, now_epoch_secs),
        None => stacktrace_text.to_string(),
    };
    let stacktrace_result = stacktrace::parse(&filtered);

    let confidence = build_confidence(input, &entities, &keywords_final, &stacktrace_result);

    let task = ResolvedTask {
        raw_text: input.text.clone(),
        raw_words,
        keywords: keywords_final,
        keyphrases,
        entities,
        domains,
        domain_weights,
        change_type,
        confidence,
        file_hints: input.file_hints.clone(),
        symbol_hints: input.symbol_hints.clone(),
    };

    (task, stacktrace_result, Vec::new())
}

fn build_confidence(
    input: &TaskInput,
    entities: &crate::types::Entities,
    keywords: &[String],
    stacktrace: &StacktraceResult,
) -> Confidence {
    let has_explicit_file = !input.file_hints.is_empty();
    let has_symbols = !entities.classes.is_empty() || !entities.methods.is_empty() || !input.symbol_hints.is_empty();
    let has_stacktrace = !stacktrace.frames.is_empty();
    let has_diff = input.diff_ref.is_some();
    let has_keywords = !keywords.is_empty();

    let mut overall: f64 = 0.0;
    if has_explicit_file {
        overall += 0.35;
    }
    if has_symbols {
        overall += 0.25;
    }
    if has_stacktrace {
        overall += 0.2;
    }
    if has_diff {
        overall += 0.1;
    }
    if has_keywords {
        overall += 0.1;
    }

    Confidence { has_explicit_file, has_symbols, has_stacktrace, has_diff, has_keywords, overall: overall.min(1.0) }
}

/// Runs discovery, scoring, and excerpting for an already-resolved task against
/// the given store and workspace root. This is the per-request half of the
/// pipeline described in §2's control-flow diagram (Indexer has already run).
pub fn pack(
    root: &Path,
    store: &Store,
    ignore: &IgnoreMatcher,
    registry: &RuleRegistry,
    domains: &[Domain],
    input: &TaskInput,
    max_files: Option<usize>,
) -> PackResult {
    let now = chrono::Utc::now().timestamp();
    let (task, stacktrace_result, _) = resolve_task(input, domains, now);

    let diff_entries = match &input.diff_ref {
        Some(reference) => diff::diff_against(root, reference),
        None => Vec::new(),
    };

    let churn_scores: HashMap<String, f64> =
        vcs::hot_files(root).into_iter().map(|(path, signal)| (path, signal.churn_score)).collect();

    let signal_map: HashMap<String, crate::types::CandidateSignals> = discovery::discover(
        store,
        &task,
        &stacktrace_result,
        &diff_entries,
        registry,
        &churn_scores,
        |path| ignore.is_ignored(path),
    )
    .into_iter()
    .collect();

    let candidates = scorer::score_and_select(signal_map, &task, &churn_scores, max_files.unwrap_or(DEFAULT_MAX_FILES));

    let excerpts = candidates
        .iter()
        .filter_map(|candidate| {
            let full_path = root.join(&candidate.path);
            let content = std::fs::read_to_string(&full_path).ok()?;
            let symbols = store.get_symbols_by_file(&candidate.path).unwrap_or_default();
            let highlight_lines: Vec<usize> = if candidate.signals.diff_hit {
                input
                    .diff_ref
                    .as_deref()
                    .map(|reference| diff::changed_lines(root, reference, &candidate.path).into_iter().collect())
                    .unwrap_or_default()
            } else {
                Vec::new()
            };
            Some(excerpt::extract(
                candidate,
                &content,
                &symbols,
                &highlight_lines,
                DEFAULT_SMALL_FILE_THRESHOLD,
                DEFAULT_WINDOW_SIZE,
                DEFAULT_MAX_LINES_PER_FILE,
            ))
        })
        .collect();

    PackResult { task, candidates, excerpts, diff_entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_task_detects_bugfix_change_type() {
        let input = TaskInput { text: "Fix bug in UserController when creating users".to_string(), ..Default::default() };
        let (task, _, _) = resolve_task(&input, &[], 0);
        assert_eq!(task.change_type, ChangeType::Bugfix);
    }

    #[test]
    fn resolve_task_confidence_reflects_explicit_file_hint() {
        let input = TaskInput {
            text: "Fix issue".to_string(),
            file_hints: vec!["app/Services/StripeService.php".to_string()],
            ..Default::default()
        };
        let (task, _, _) = resolve_task(&input, &[], 0);
        assert!(task.confidence.has_explicit_file);
        assert!(task.confidence.overall >= 0.35);
    }
}
