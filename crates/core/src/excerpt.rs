//! Bounded per-file snippet composition: full-file inclusion under a small-file
//! threshold, else the union of header/highlight/symbol regions, capped and
//! gap-annotated (§4.15).

use crate::types::{Candidate, Excerpt, Symbol};

pub const DEFAULT_SMALL_FILE_THRESHOLD: usize = 200;
pub const DEFAULT_WINDOW_SIZE: usize = 20;
pub const DEFAULT_MAX_LINES_PER_FILE: usize = 300;
const MIN_HEADER_LINES: usize = 10;

/// 1-based, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Range {
    start: usize,
    end: usize,
}

fn header_range(total_lines: usize) -> Range {
    Range { start: 1, end: MIN_HEADER_LINES.min(total_lines).max(1) }
}

fn highlight_ranges(highlight_lines: &[usize], total_lines: usize, window: usize) -> Vec<Range> {
    highlight_lines
        .iter()
        .map(|&line| Range {
            start: line.saturating_sub(window).max(1),
            end: (line + window).min(total_lines),
        })
        .collect()
}

/// Picks symbol ranges in priority order (class > interface > function > method >
/// constant > variable when `symbol_match`; by start line otherwise) and returns
/// them as inclusive line ranges.
fn symbol_ranges(symbols: &[Symbol], prioritize_by_kind: bool) -> Vec<Range> {
    let mut ordered = symbols.to_vec();
    if prioritize_by_kind {
        ordered.sort_by_key(|s| (s.kind.priority(), s.start_line));
    } else {
        ordered.sort_by_key(|s| s.start_line);
    }
    ordered.into_iter().map(|s| Range { start: s.start_line, end: s.end_line }).collect()
}

fn merge_ranges(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.sort();
    let mut merged: Vec<Range> = Vec::new();
    for r in ranges {
        if let Some(last) = merged.last_mut() {
            if r.start <= last.end + 1 {
                last.end = last.end.max(r.end);
                continue;
            }
        }
        merged.push(r);
    }
    merged
}

fn cap_total_lines(ranges: Vec<Range>, max_lines: usize) -> Vec<Range> {
    let mut kept = Vec::new();
    let mut used = 0usize;
    for r in ranges {
        let len = r.end - r.start + 1;
        if used >= max_lines {
            break;
        }
        if used + len > max_lines {
            let allowed = max_lines - used;
            kept.push(Range { start: r.start, end: r.start + allowed - 1 });
            used = max_lines;
            break;
        }
        kept.push(r);
        used += len;
    }
    kept
}

/// Builds an excerpt for one candidate's file content, given the symbols owned
/// by the file and externally-supplied highlight lines (e.g. changed diff lines).
pub fn extract(
    candidate: &Candidate,
    content: &str,
    symbols: &[Symbol],
    highlight_lines: &[usize],
    small_file_threshold: usize,
    window_size: usize,
    max_lines_per_file: usize,
) -> Excerpt {
    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();

    if total_lines <= small_file_threshold {
        return Excerpt {
            path: candidate.path.clone(),
            content: number_lines(&lines, 1),
            start_line: 1,
            end_line: total_lines,
            total_lines,
            truncated: false,
        };
    }

    // Ordered by priority, not position: header always first, then highlights,
    // then symbol ranges (kind-prioritised when symbolMatch). cap_total_lines
    // must run against this order so a lower-priority but earlier-positioned
    // range isn't kept over a higher-priority later one; merge_ranges then
    // re-sorts by position purely for rendering.
    let mut ranges = vec![header_range(total_lines)];
    ranges.extend(highlight_ranges(highlight_lines, total_lines, window_size));

    if !symbols.is_empty() {
        let prioritize_by_kind = candidate.signals.symbol_match;
        ranges.extend(symbol_ranges(symbols, prioritize_by_kind));
    }

    let within_budget = cap_total_lines(ranges, max_lines_per_file);
    let capped = merge_ranges(within_budget);

    let included_lines: usize = capped.iter().map(|r| r.end - r.start + 1).sum();
    let content = render_with_gaps(&lines, &capped);
    let start_line = capped.first().map(|r| r.start).unwrap_or(1);
    let end_line = capped.last().map(|r| r.end).unwrap_or(0);

    Excerpt {
        path: candidate.path.clone(),
        content,
        start_line,
        end_line,
        total_lines,
        truncated: included_lines < total_lines,
    }
}

fn number_lines(lines: &[&str], start: usize) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>5} | {}", start + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_with_gaps(lines: &[&str], ranges: &[Range]) -> String {
    let mut out = String::new();
    for (i, range) in ranges.iter().enumerate() {
        if i > 0 {
            out.push_str("//  … (lines omitted)\n");
        }
        let slice = &lines[range.start - 1..range.end.min(lines.len())];
        out.push_str(&number_lines(slice, range.start));
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CandidateSignals, SymbolKind};

    fn candidate(path: &str, symbol_match: bool) -> Candidate {
        Candidate {
            path: path.to_string(),
            score: 1.0,
            reasons: vec![],
            signals: CandidateSignals { symbol_match, ..Default::default() },
        }
    }

    fn sample_content(lines: usize) -> String {
        (1..=lines).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn small_file_is_included_whole() {
        let content = sample_content(50);
        let excerpt = extract(&candidate("a.rs", false), &content, &[], &[], 200, 20, 300);
        assert!(!excerpt.truncated);
        assert_eq!(excerpt.end_line, 50);
    }

    #[test]
    fn large_file_without_hints_keeps_header_only() {
        let content = sample_content(500);
        let excerpt = extract(&candidate("a.rs", false), &content, &[], &[], 200, 20, 300);
        assert!(excerpt.truncated);
        assert!(excerpt.content.contains("line 1"));
        assert!(!excerpt.content.contains("line 500"));
    }

    #[test]
    fn highlight_window_is_included_around_changed_line() {
        let content = sample_content(500);
        let excerpt = extract(&candidate("a.rs", false), &content, &[], &[300], 200, 20, 300);
        assert!(excerpt.content.contains("line 300"));
    }

    #[test]
    fn symbol_ranges_prioritize_class_over_method_when_symbol_match() {
        let content = sample_content(500);
        let symbols = vec![
            Symbol { file: "a.rs".into(), name: "m".into(), kind: SymbolKind::Method, start_line: 400, end_line: 405, signature: None },
            Symbol { file: "a.rs".into(), name: "C".into(), kind: SymbolKind::Class, start_line: 200, end_line: 250, signature: None },
        ];
        let excerpt = extract(&candidate("a.rs", true), &content, &symbols, &[], 200, 20, 60);
        assert!(excerpt.content.contains("line 200"));
    }

    #[test]
    fn gap_marker_separates_disjoint_ranges() {
        let content = sample_content(500);
        let excerpt = extract(&candidate("a.rs", false), &content, &[], &[300], 200, 5, 300);
        assert!(excerpt.content.contains("(lines omitted)"));
    }
}
