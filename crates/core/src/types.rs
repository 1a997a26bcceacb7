//! Core data model shared across the pipeline: indexed file/symbol/import records,
//! VCS and full-text signals, the resolved task value, per-candidate signals and
//! scores, and the excerpt shape handed to the (external) renderer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Store-owned records
// ---------------------------------------------------------------------------

/// A file known to the index. Identity is the workspace-relative, forward-slashed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub size: u64,
    /// Modification time, epoch milliseconds.
    pub mtime_ms: i64,
    pub content_hash: String,
}

/// Kind of a symbol extracted from a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Interface,
    Function,
    Method,
    Constant,
    Variable,
}

impl SymbolKind {
    /// Priority used by the Excerpt Extractor when `symbolMatch` is set:
    /// class > interface > function > method > constant > variable.
    pub fn priority(self) -> u8 {
        match self {
            SymbolKind::Class => 0,
            SymbolKind::Interface => 1,
            SymbolKind::Function => 2,
            SymbolKind::Method => 3,
            SymbolKind::Constant => 4,
            SymbolKind::Variable => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constant => "constant",
            SymbolKind::Variable => "variable",
        }
    }
}

/// A named, kinded, line-ranged symbol owned by exactly one `FileRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub file: String,
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive. Always >= start_line.
    pub end_line: usize,
    pub signature: Option<String>,
}

/// A directed edge between two indexed files, discovered by the Import Graph Builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    pub source: String,
    pub target: String,
    pub symbol: Option<String>,
}

/// Per-file version-control signal: recency and churn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsSignal {
    pub last_modified: Option<String>,
    pub commit_count: usize,
    /// Normalized against the most-churned file in the lookback window, in [0, 1].
    pub churn_score: f64,
}

/// Aggregate counters exposed by `Store::stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub files: usize,
    pub symbols: usize,
    pub imports: usize,
    pub vcs_signals: usize,
}

// ---------------------------------------------------------------------------
// Scan configuration
// ---------------------------------------------------------------------------

/// Runtime scan configuration. Independent of any one file's language.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    /// Max file size in bytes that will be indexed. Default 1 MiB per spec.md §4.3.
    pub max_file_size: u64,
}

impl ScanConfig {
    pub fn new(root: PathBuf) -> Self {
        Self { root, max_file_size: 1024 * 1024 }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

// ---------------------------------------------------------------------------
// Resolved task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Bugfix,
    Feature,
    Refactor,
    Perf,
    Security,
    Unknown,
}

impl Default for ChangeType {
    fn default() -> Self {
        ChangeType::Unknown
    }
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Bugfix => "bugfix",
            ChangeType::Feature => "feature",
            ChangeType::Refactor => "refactor",
            ChangeType::Perf => "perf",
            ChangeType::Security => "security",
            ChangeType::Unknown => "unknown",
        }
    }
}

/// Case-variant forms generated for every extracted class/method entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityVariants {
    pub original: String,
    pub snake: String,
    pub camel: String,
    pub pascal: String,
    pub lower_concat: String,
}

/// Entities extracted from task text: class-like names, method names, file names,
/// route patterns, and error codes, each with case variants where applicable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    pub classes: Vec<EntityVariants>,
    pub methods: Vec<EntityVariants>,
    pub files: Vec<String>,
    pub routes: Vec<String>,
    pub error_codes: Vec<String>,
}

/// Advisory confidence bundle produced by the Task Resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Confidence {
    pub has_explicit_file: bool,
    pub has_symbols: bool,
    pub has_stacktrace: bool,
    pub has_diff: bool,
    pub has_keywords: bool,
    pub overall: f64,
}

impl Confidence {
    /// Interface hint per spec.md §9: `< 0.3` vague, `[0.3, 0.5)` needs clarification.
    pub fn label(&self) -> &'static str {
        if self.overall < 0.3 {
            "vague"
        } else if self.overall < 0.5 {
            "needs clarification"
        } else {
            "confident"
        }
    }
}

/// Immutable value produced by the Task Resolver: everything downstream discovery
/// and scoring needs to know about the natural-language task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedTask {
    pub raw_text: String,
    pub raw_words: Vec<String>,
    pub keywords: Vec<String>,
    pub keyphrases: Vec<String>,
    pub entities: Entities,
    pub domains: Vec<String>,
    pub domain_weights: HashMap<String, f64>,
    pub change_type: ChangeType,
    pub confidence: Confidence,
    /// Explicit file-path hints pulled from task text (`@path/to/file.ext`).
    pub file_hints: Vec<String>,
    /// Explicit symbol hints (CLI `--symbol` or entity extraction).
    pub symbol_hints: Vec<String>,
}

// ---------------------------------------------------------------------------
// Candidate signals and scoring
// ---------------------------------------------------------------------------

/// Independent per-candidate evidence, OR-merged across discovery producers.
/// `graph_depth` takes the minimum (shortest path) on merge instead of OR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSignals {
    pub stacktrace_hit: bool,
    pub diff_hit: bool,
    pub file_hint_exact: bool,
    pub file_hint_hit: bool,
    pub symbol_match: bool,
    pub exact_symbol_mention: bool,
    pub keyword_match: bool,
    pub graph_related: bool,
    pub graph_depth: Option<usize>,
    pub graph_decay: f64,
    pub test_file: bool,
    pub git_hotspot: bool,
    pub related_file: bool,
    pub example_usage: bool,
    pub raw_path_match_count: usize,
    pub filename_match_count: usize,
    pub basename_match_count: usize,
}

impl CandidateSignals {
    /// OR-merge booleans and small numerics; `graph_depth`/`graph_decay` take the
    /// value from whichever side has the smaller depth (min wins, per spec.md §3).
    pub fn merge(&mut self, other: &CandidateSignals) {
        self.stacktrace_hit |= other.stacktrace_hit;
        self.diff_hit |= other.diff_hit;
        self.file_hint_exact |= other.file_hint_exact;
        self.file_hint_hit |= other.file_hint_hit;
        self.symbol_match |= other.symbol_match;
        self.exact_symbol_mention |= other.exact_symbol_mention;
        self.keyword_match |= other.keyword_match;
        self.test_file |= other.test_file;
        self.git_hotspot |= other.git_hotspot;
        self.related_file |= other.related_file;
        self.example_usage |= other.example_usage;
        self.raw_path_match_count = self.raw_path_match_count.max(other.raw_path_match_count);
        self.filename_match_count = self.filename_match_count.max(other.filename_match_count);
        self.basename_match_count = self.basename_match_count.max(other.basename_match_count);

        match (self.graph_depth, other.graph_depth) {
            (None, Some(d)) => {
                self.graph_depth = Some(d);
                self.graph_decay = other.graph_decay;
            }
            (Some(a), Some(b)) if b < a => {
                self.graph_depth = Some(b);
                self.graph_decay = other.graph_decay;
            }
            _ => {}
        }
        self.graph_related = self.graph_related || other.graph_related || self.graph_depth.is_some();
    }

    /// Count of true boolean signals, used by the Scorer's "≥3 signals" bonus.
    pub fn true_signal_count(&self) -> usize {
        [
            self.stacktrace_hit,
            self.diff_hit,
            self.file_hint_exact,
            self.file_hint_hit,
            self.symbol_match,
            self.exact_symbol_mention,
            self.keyword_match,
            self.graph_related,
            self.test_file,
            self.git_hotspot,
            self.related_file,
            self.example_usage,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

/// A scored, reasoned candidate file, produced by the Scorer and consumed by the
/// Excerpt Extractor and downstream renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    /// Normalized to [0, 1]; the top-scoring candidate in a non-empty result is 1.0.
    pub score: f64,
    pub reasons: Vec<String>,
    pub signals: CandidateSignals,
}

// ---------------------------------------------------------------------------
// Excerpts
// ---------------------------------------------------------------------------

/// Bounded per-file snippet composition, gaps marked with an omission comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Excerpt {
    pub path: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub total_lines: usize,
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// Diff / stacktrace shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Deleted,
    Renamed,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    pub file: String,
    pub status: DiffStatus,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: usize,
    pub column: Option<usize>,
    pub function: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StacktraceResult {
    pub frames: Vec<StackFrame>,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Domain registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pack / ctx.json contract (§6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtxFileEntry {
    pub path: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtxJson {
    pub version: String,
    pub timestamp: String,
    pub slug: String,
    pub task: ResolvedTask,
    pub files: Vec<CtxFileEntry>,
    #[serde(rename = "budgetTokens")]
    pub budget_tokens: usize,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_merge_prefers_shallower_graph_depth() {
        let mut a = CandidateSignals { graph_depth: Some(2), graph_decay: 0.5, ..Default::default() };
        let b = CandidateSignals { graph_depth: Some(1), graph_decay: 1.0, ..Default::default() };
        a.merge(&b);
        assert_eq!(a.graph_depth, Some(1));
        assert_eq!(a.graph_decay, 1.0);
        assert!(a.graph_related);
    }

    #[test]
    fn signal_merge_is_or_for_booleans() {
        let mut a = CandidateSignals { keyword_match: true, ..Default::default() };
        let b = CandidateSignals { symbol_match: true, ..Default::default() };
        a.merge(&b);
        assert!(a.keyword_match);
        assert!(a.symbol_match);
    }

    #[test]
    fn symbol_kind_priority_orders_class_above_variable() {
        assert!(SymbolKind::Class.priority() < SymbolKind::Variable.priority());
    }

    #[test]
    fn confidence_label_thresholds() {
        let mut c = Confidence { overall: 0.1, ..Default::default() };
        assert_eq!(c.label(), "vague");
        c.overall = 0.4;
        assert_eq!(c.label(), "needs clarification");
        c.overall = 0.8;
        assert_eq!(c.label(), "confident");
    }
}
