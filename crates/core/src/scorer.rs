//! Weighted-signal scoring, multiplicative bonuses, slot-reserved selection,
//! max-normalisation, and reason generation (§4.14).

use std::collections::HashMap;

use crate::types::{Candidate, CandidateSignals, ResolvedTask};

pub const DEFAULT_MAX_FILES: usize = 25;

const ENTRY_POINT_MARKERS: &[&str] = &["controller", "handler", "middleware", "routes", "index.", "main.", "app."];
const MODEL_MARKERS: &[&str] = &["models/", "entities/", ".model.", "model.", "entity."];
const CONFIG_MARKERS: &[&str] =
    &["config", ".toml", ".yaml", ".yml", ".env", "settings", "package.json", "composer.json"];

/// Per-candidate weighted sum, before bonuses (§4.14 weight table).
fn weighted_sum(signals: &CandidateSignals, domain_weight: f64) -> f64 {
    let mut total = 0.0;
    if signals.file_hint_exact {
        total += 2.00;
    }
    if signals.file_hint_hit {
        total += 0.40;
    }
    if signals.stacktrace_hit {
        total += 0.30;
    }
    if signals.diff_hit {
        total += 0.22;
    }
    total += 0.25 * signals.raw_path_match_count.min(3) as f64;
    if signals.symbol_match {
        total += 0.20;
    }
    if signals.keyword_match {
        total += 0.08;
    }
    if signals.test_file {
        total += 0.05;
    }
    if signals.git_hotspot {
        total += 0.04;
    }
    if signals.related_file {
        total += 0.12;
    }
    if signals.example_usage {
        total += 0.04;
    }
    if signals.graph_related {
        total += 0.05 * domain_weight * signals.graph_decay;
    }
    total
}

/// `max(0.2, sum(domainWeights[d] for d matched in file path) / sum(domainWeights))`,
/// or 1 when no domains were detected for the task.
fn domain_weight(path: &str, task: &ResolvedTask) -> f64 {
    if task.domain_weights.is_empty() {
        return 1.0;
    }
    let total: f64 = task.domain_weights.values().sum();
    if total <= 0.0 {
        return 1.0;
    }
    let lower = path.to_lowercase();
    let matched: f64 = task
        .domain_weights
        .iter()
        .filter(|(name, _)| lower.contains(name.to_lowercase().as_str()))
        .map(|(_, w)| w)
        .sum();
    (matched / total).max(0.2)
}

fn is_entry_point(path: &str) -> bool {
    let lower = path.to_lowercase();
    ENTRY_POINT_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_model_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    MODEL_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_config_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    CONFIG_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_test_file(path: &str, signals: &CandidateSignals) -> bool {
    signals.test_file || {
        let lower = path.to_lowercase();
        lower.contains("test") || lower.contains("spec") || lower.contains("__tests__")
    }
}

/// Applies the nine multiplicative bonuses to `base`, in the order given in §4.14.
fn apply_bonuses(
    base: f64,
    path: &str,
    signals: &CandidateSignals,
    task: &ResolvedTask,
    same_dir_as_trace_or_diff: bool,
    churn_score: f64,
) -> f64 {
    let mut score = base;

    if is_entry_point(path) {
        let strong = signals.file_hint_hit
            || signals.stacktrace_hit
            || signals.diff_hit
            || signals.raw_path_match_count >= 1
            || signals.exact_symbol_mention;
        score *= if strong { 1.3 } else { 1.1 };
    }

    if is_model_file(path) {
        score *= 1.2;
    }

    if signals.symbol_match {
        score *= 1.25;
    }

    let dw = domain_weight(path, task);
    let total_dw: f64 = task.domain_weights.values().sum();
    if total_dw > 0.0 {
        score *= 1.0 + 0.25 * dw;
    }

    if signals.raw_path_match_count >= 2 {
        score *= 1.4_f64.powi(signals.raw_path_match_count as i32 - 1);
    }

    if signals.filename_match_count >= 2 {
        score *= 1.2_f64.powi(signals.filename_match_count as i32 - 1);
        if signals.filename_match_count >= 4 {
            score *= 1.3;
        }
    }

    if signals.basename_match_count >= 2 && signals.raw_path_match_count >= 1 {
        score *= 1.5_f64.powi(signals.basename_match_count as i32 - 1);
    }

    if signals.true_signal_count() >= 3 {
        score *= 1.15;
    }

    if same_dir_as_trace_or_diff {
        score *= 1.1;
    }

    if churn_score > 0.5 {
        score *= 1.1;
    }

    score
}

fn directory_of(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn build_reasons(path: &str, signals: &CandidateSignals, task: &ResolvedTask) -> Vec<String> {
    let mut reasons = Vec::new();

    if signals.file_hint_exact {
        reasons.push("exact file match (explicitly mentioned)".to_string());
    }
    if signals.exact_symbol_mention {
        reasons.push("contains explicitly mentioned symbol (reserved)".to_string());
    }
    if signals.file_hint_hit {
        reasons.push("filename partially matches an explicit hint".to_string());
    }
    if signals.stacktrace_hit {
        reasons.push("appears in stacktrace".to_string());
    }
    if signals.diff_hit {
        reasons.push("changed in diff".to_string());
    }
    if signals.symbol_match && !signals.exact_symbol_mention {
        reasons.push("contains a matching symbol".to_string());
    }
    if signals.raw_path_match_count > 0 {
        reasons.push(format!("path contains {} exact task word(s)", signals.raw_path_match_count));
    }
    if signals.keyword_match {
        reasons.push("matches task keywords".to_string());
    }
    if let Some(depth) = signals.graph_depth {
        reasons.push(format!("related via imports ({depth} hops)"));
    }
    if signals.related_file {
        reasons.push("referenced from another candidate's content".to_string());
    }
    if signals.test_file {
        reasons.push("test file paired with a candidate".to_string());
    }
    if signals.git_hotspot {
        reasons.push("frequently changed recently".to_string());
    }
    if signals.example_usage {
        reasons.push("contains example usage".to_string());
    }
    if !task.domains.is_empty() && task.domains.iter().any(|d| path.to_lowercase().contains(d.to_lowercase().as_str())) {
        reasons.push("in a domain relevant to the task".to_string());
    }

    reasons
}

/// Score, rank, and select up to `max_files` candidates, with the slot-reserved
/// quota selection and final max-normalisation.
pub fn score_and_select(
    signal_map: HashMap<String, CandidateSignals>,
    task: &ResolvedTask,
    churn_scores: &HashMap<String, f64>,
    max_files: usize,
) -> Vec<Candidate> {
    let directories_with_trace_or_diff: Vec<&str> = signal_map
        .iter()
        .filter(|(_, s)| s.stacktrace_hit || s.diff_hit)
        .map(|(p, _)| directory_of(p))
        .collect();

    let mut scored: Vec<Candidate> = signal_map
        .iter()
        .map(|(path, signals)| {
            let churn = churn_scores.get(path).copied().unwrap_or(0.0);
            let dw = domain_weight(path, task);
            let base = weighted_sum(signals, dw);
            let same_dir = directories_with_trace_or_diff.contains(&directory_of(path));
            let score = apply_bonuses(base, path, signals, task, same_dir, churn);
            Candidate { path: path.clone(), score, reasons: build_reasons(path, signals, task), signals: signals.clone() }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let reserved: Vec<Candidate> = scored
        .iter()
        .filter(|c| (c.signals.file_hint_exact || c.signals.exact_symbol_mention) && !is_test_file(&c.path, &c.signals))
        .cloned()
        .collect();
    let reserved_paths: std::collections::HashSet<String> = reserved.iter().map(|c| c.path.clone()).collect();

    let remaining_slots = max_files.saturating_sub(reserved.len());
    let mut selected = reserved;

    let non_test_non_config: Vec<&Candidate> = scored
        .iter()
        .filter(|c| !reserved_paths.contains(c.path.as_str()))
        .filter(|c| !is_test_file(&c.path, &c.signals) && !is_config_file(&c.path))
        .collect();
    let fill_main = ((remaining_slots as f64) * 0.7).floor() as usize;
    for c in non_test_non_config.into_iter().take(fill_main) {
        selected.push(c.clone());
    }
    let included_basenames: Vec<String> =
        selected.iter().map(|c| basename_stem(&c.path)).collect();

    let remaining_after_main = max_files.saturating_sub(selected.len());
    let test_candidates: Vec<&Candidate> = scored
        .iter()
        .filter(|c| !selected.iter().any(|s| s.path == c.path))
        .filter(|c| is_test_file(&c.path, &c.signals))
        .filter(|c| included_basenames.iter().any(|b| basename_stem(&c.path).contains(b.as_str()) || b.contains(basename_stem(&c.path).as_str())))
        .collect();
    let fill_test = ((remaining_after_main as f64) * 0.2).floor() as usize;
    for c in test_candidates.into_iter().take(fill_test) {
        selected.push(c.clone());
    }

    let remaining_after_test = max_files.saturating_sub(selected.len());
    let config_candidates: Vec<&Candidate> = scored
        .iter()
        .filter(|c| !selected.iter().any(|s| s.path == c.path))
        .filter(|c| is_config_file(&c.path))
        .filter(|c| task.domains.iter().any(|d| c.path.to_lowercase().contains(d.to_lowercase().as_str())))
        .collect();
    let fill_config = ((remaining_after_test as f64) * 0.1).floor() as usize;
    for c in config_candidates.into_iter().take(fill_config) {
        selected.push(c.clone());
    }

    selected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    if let Some(top) = selected.first().map(|c| c.score) {
        if top > 0.0 {
            for c in &mut selected {
                c.score /= top;
            }
        }
    }

    selected
}

fn basename_stem(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.split('.').next().unwrap_or(base).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> ResolvedTask {
        ResolvedTask::default()
    }

    #[test]
    fn file_hint_exact_dominates_weighted_sum() {
        let exact = CandidateSignals { file_hint_exact: true, ..Default::default() };
        let keyword = CandidateSignals { keyword_match: true, ..Default::default() };
        assert!(weighted_sum(&exact, 1.0) > weighted_sum(&keyword, 1.0) * 5.0);
    }

    #[test]
    fn reserved_slot_guarantees_inclusion() {
        let mut map = HashMap::new();
        map.insert("src/hinted.rs".to_string(), CandidateSignals { file_hint_exact: true, ..Default::default() });
        for i in 0..30 {
            map.insert(format!("src/other_{i}.rs"), CandidateSignals { keyword_match: true, ..Default::default() });
        }
        let result = score_and_select(map, &task(), &HashMap::new(), 10);
        assert!(result.iter().any(|c| c.path == "src/hinted.rs"));
    }

    #[test]
    fn top_score_normalizes_to_one() {
        let mut map = HashMap::new();
        map.insert("a.rs".to_string(), CandidateSignals { file_hint_exact: true, ..Default::default() });
        map.insert("b.rs".to_string(), CandidateSignals { keyword_match: true, ..Default::default() });
        let result = score_and_select(map, &task(), &HashMap::new(), 10);
        let top = result.iter().map(|c| c.score).fold(0.0, f64::max);
        assert!((top - 1.0).abs() < 1e-9);
    }

    #[test]
    fn raw_path_multi_match_bonus_compounds() {
        let one = CandidateSignals { raw_path_match_count: 1, ..Default::default() };
        let three = CandidateSignals { raw_path_match_count: 3, ..Default::default() };
        let base_one = apply_bonuses(weighted_sum(&one, 1.0), "a.rs", &one, &task(), false, 0.0);
        let base_three = apply_bonuses(weighted_sum(&three, 1.0), "a.rs", &three, &task(), false, 0.0);
        assert!(base_three > base_one);
    }

    #[test]
    fn entry_point_bonus_is_higher_with_strong_signal() {
        let weak = CandidateSignals::default();
        let strong = CandidateSignals { stacktrace_hit: true, ..Default::default() };
        let weak_score = apply_bonuses(1.0, "app/controllers/user.rs", &weak, &task(), false, 0.0);
        let strong_score = apply_bonuses(1.0, "app/controllers/user.rs", &strong, &task(), false, 0.0);
        assert!(strong_score > weak_score);
    }
}
