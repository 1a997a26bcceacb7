//! Entity extraction, TF-IDF keyword ranking, RAKE keyphrase extraction, domain
//! detection, and change-type detection over raw task text (§4.9).

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{ChangeType, Domain, Entities, EntityVariants};

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "to", "of", "in", "on",
    "at", "for", "with", "and", "or", "but", "not", "this", "that", "these", "those", "it", "its",
    "as", "by", "from", "into", "when", "while", "than", "then", "so", "such", "can", "could",
    "should", "would", "will", "shall", "do", "does", "did", "has", "have", "had", "i", "we",
    "you", "he", "she", "they", "them", "their", "our", "your", "my",
];

/// Short technical terms allowed through the length filter despite being
/// shorter than the general minimum length.
const SHORT_ALLOW_LIST: &[&str] = &["ui", "ci", "db", "id", "api", "cli", "io", "os"];

const MIN_TOKEN_LEN: usize = 3;
const TOP_KEYWORDS: usize = 20;
const TOP_KEYPHRASES: usize = 10;

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

pub fn tokenize_raw_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= MIN_TOKEN_LEN || SHORT_ALLOW_LIST.contains(&w.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Entity extraction
// ---------------------------------------------------------------------------

macro_rules! static_regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).expect("valid entity regex"))
        }
    };
}

static_regex!(pascal_case, r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+\b");
static_regex!(snake_case, r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b");
static_regex!(camel_case, r"\b[a-z]+(?:[A-Z][a-z0-9]*)+\b");
static_regex!(obj_method, r"\b([A-Za-z_]\w*)(?:\.|::)([A-Za-z_]\w*)\b");
static_regex!(file_token, r"\b[\w./-]+\.(?:ts|tsx|js|jsx|py|php|rb|go|rs|java|kt|cs|swift|cpp|c|h|vue)\b");
static_regex!(route_pattern, r"\b(?:GET|POST|PUT|PATCH|DELETE)?\s*(/[\w/:{}-]{2,})\b");
static_regex!(error_code, r"\b(?:[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+|[45]\d{2})\b");

/// Extracts class-like/method/file/route/error-code entities from raw task
/// text, generating case variants for class and method tokens.
pub fn extract_entities(text: &str) -> Entities {
    let mut classes: Vec<EntityVariants> = Vec::new();
    let mut methods: Vec<EntityVariants> = Vec::new();
    let mut seen_classes = HashSet::new();
    let mut seen_methods = HashSet::new();

    for m in pascal_case().find_iter(text) {
        if seen_classes.insert(m.as_str().to_string()) {
            classes.push(variants_for(m.as_str()));
        }
    }
    for m in snake_case().find_iter(text) {
        let word = m.as_str();
        if is_stopword(word) {
            continue;
        }
        if seen_classes.insert(word.to_string()) {
            classes.push(variants_for(word));
        }
    }
    for m in camel_case().find_iter(text) {
        if seen_classes.insert(m.as_str().to_string()) {
            classes.push(variants_for(m.as_str()));
        }
    }
    for caps in obj_method().captures_iter(text) {
        let method = caps.get(2).unwrap().as_str();
        if seen_methods.insert(method.to_string()) {
            methods.push(variants_for(method));
        }
    }

    let files: Vec<String> = file_token().find_iter(text).map(|m| m.as_str().to_string()).collect();
    let routes: Vec<String> = route_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    let error_codes: Vec<String> =
        error_code().find_iter(text).map(|m| m.as_str().to_string()).collect();

    Entities { classes, methods, files, routes, error_codes }
}

fn split_words(token: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = token.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if prev_lower || (next_lower && current.chars().last().map(|l| l.is_uppercase()).unwrap_or(false)) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn variants_for(token: &str) -> EntityVariants {
    let words = split_words(token);
    let snake = words.join("_");
    let camel = words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
        .collect::<String>();
    let pascal = words.iter().map(|w| capitalize(w)).collect::<String>();
    let lower_concat = words.concat();
    EntityVariants { original: token.to_string(), snake, camel, pascal, lower_concat }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// TF-IDF keyword ranking (heuristic IDF — no seeded corpus at task-text scale)
// ---------------------------------------------------------------------------

/// Heuristic IDF bonus used in place of a corpus-derived document frequency:
/// rewards length, identifier shape (snake/camel), embedded digits, and
/// all-caps tokens, each being weak signals of technical specificity.
fn heuristic_idf(token: &str) -> f64 {
    let mut score = 1.0;
    if token.len() > 8 {
        score += 0.5;
    }
    if token.contains('_') {
        score += 0.3;
    }
    if token.chars().any(|c| c.is_uppercase()) && token.chars().any(|c| c.is_lowercase()) {
        score += 0.3;
    }
    if token.chars().any(|c| c.is_ascii_digit()) {
        score += 0.2;
    }
    if token.len() > 1 && token.chars().all(|c| c.is_uppercase()) {
        score += 0.4;
    }
    score
}

/// Ranks stopword-filtered, length-filtered tokens by `tf * heuristic_idf`,
/// keeping the top 20.
pub fn tfidf_keywords(raw_words: &[String]) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for word in raw_words {
        if is_stopword(word) {
            continue;
        }
        *freq.entry(word.clone()).or_insert(0) += 1;
    }
    let mut scored: Vec<(String, f64)> = freq
        .into_iter()
        .map(|(word, count)| {
            let score = count as f64 * heuristic_idf(&word);
            (word, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    scored.into_iter().take(TOP_KEYWORDS).map(|(w, _)| w).collect()
}

// ---------------------------------------------------------------------------
// RAKE keyphrase extraction
// ---------------------------------------------------------------------------

/// Splits `text` on stopwords/punctuation into 2-4 word candidate phrases,
/// scores each word by `(degree + freq) / freq`, sums per phrase, and returns
/// the top 10 multi-word phrases by score.
pub fn rake_keyphrases(text: &str) -> Vec<String> {
    let words = tokenize_raw_words(text);
    let mut phrases: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for word in &words {
        if is_stopword(word) {
            if !current.is_empty() {
                phrases.push(std::mem::take(&mut current));
            }
        } else {
            current.push(word.clone());
        }
    }
    if !current.is_empty() {
        phrases.push(current);
    }
    let phrases: Vec<Vec<String>> =
        phrases.into_iter().filter(|p| p.len() >= 2 && p.len() <= 4).collect();

    let mut freq: HashMap<String, usize> = HashMap::new();
    let mut degree: HashMap<String, usize> = HashMap::new();
    for phrase in &phrases {
        let extra_degree = phrase.len() - 1;
        for word in phrase {
            *freq.entry(word.clone()).or_insert(0) += 1;
            *degree.entry(word.clone()).or_insert(0) += extra_degree;
        }
    }

    let word_score = |w: &str| -> f64 {
        let f = *freq.get(w).unwrap_or(&1) as f64;
        let d = *degree.get(w).unwrap_or(&0) as f64;
        (d + f) / f
    };

    let mut scored: Vec<(String, f64)> = phrases
        .into_iter()
        .map(|phrase| {
            let score: f64 = phrase.iter().map(|w| word_score(w)).sum();
            (phrase.join(" "), score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored.into_iter().take(TOP_KEYPHRASES).map(|(p, _)| p).collect()
}

// ---------------------------------------------------------------------------
// Domain detection
// ---------------------------------------------------------------------------

/// Counts, for each active domain, how many of `keywords` match any of its
/// keyword list. Returns domains with a positive count, sorted by count desc.
pub fn detect_domains(keywords: &[String], domains: &[Domain]) -> (Vec<String>, HashMap<String, f64>) {
    let keyword_set: HashSet<&str> = keywords.iter().map(|k| k.as_str()).collect();
    let mut weights: HashMap<String, f64> = HashMap::new();
    for domain in domains {
        let count = domain
            .keywords
            .iter()
            .filter(|k| keyword_set.contains(k.to_lowercase().as_str()))
            .count();
        if count > 0 {
            weights.insert(domain.name.clone(), count as f64);
        }
    }
    let mut ordered: Vec<(String, f64)> = weights.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    (ordered.into_iter().map(|(k, _)| k).collect(), weights)
}

// ---------------------------------------------------------------------------
// Change-type detection
// ---------------------------------------------------------------------------

const CHANGE_TYPE_KEYWORDS: &[(ChangeType, &[&str])] = &[
    (ChangeType::Bugfix, &["fix", "bug", "error", "crash", "broken", "fail", "issue", "defect", "regression"]),
    (ChangeType::Feature, &["add", "implement", "new", "feature", "support", "create", "introduce"]),
    (ChangeType::Refactor, &["refactor", "cleanup", "restructure", "reorganize", "simplify", "rename"]),
    (ChangeType::Perf, &["performance", "perf", "optimize", "slow", "speed", "latency", "throughput"]),
    (ChangeType::Security, &["security", "vulnerability", "exploit", "cve", "injection", "xss", "auth"]),
];

/// Scores each candidate change type by keyword hits; argmax; ties broken by
/// declaration order (bugfix first); all-zero ⇒ unknown.
pub fn detect_change_type(raw_words: &[String]) -> ChangeType {
    let word_set: HashSet<&str> = raw_words.iter().map(|w| w.as_str()).collect();
    let mut best = ChangeType::Unknown;
    let mut best_score = 0usize;
    for (kind, keywords) in CHANGE_TYPE_KEYWORDS {
        let score = keywords.iter().filter(|k| word_set.contains(*k)).count();
        if score > best_score {
            best_score = score;
            best = *kind;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_pascal_case_class_name() {
        let entities = extract_entities("Bug in UserController when creating users");
        assert!(entities.classes.iter().any(|c| c.original == "UserController"));
    }

    #[test]
    fn extracts_file_token_with_known_extension() {
        let entities = extract_entities("Fix issue in @app/Services/StripeService.php");
        assert!(entities.files.iter().any(|f| f.ends_with("StripeService.php")));
    }

    #[test]
    fn extracts_method_from_namespaced_call() {
        let entities = extract_entities("UserService::createUser fails silently");
        assert!(entities.methods.iter().any(|m| m.original == "createUser"));
    }

    #[test]
    fn variants_cover_snake_camel_pascal() {
        let v = variants_for("user_controller");
        assert_eq!(v.snake, "user_controller");
        assert_eq!(v.camel, "userController");
        assert_eq!(v.pascal, "UserController");
        assert_eq!(v.lower_concat, "usercontroller");
    }

    #[test]
    fn tfidf_keeps_at_most_twenty_and_filters_stopwords() {
        let words = tokenize_raw_words("the quick brown fox jumps over the lazy dog repeatedly");
        let ranked = tfidf_keywords(&words);
        assert!(ranked.len() <= TOP_KEYWORDS);
        assert!(!ranked.contains(&"the".to_string()));
    }

    #[test]
    fn rake_returns_multi_word_phrases_only() {
        let phrases = rake_keyphrases("payment webhook error with stripe checkout integration");
        assert!(phrases.iter().all(|p| p.split_whitespace().count() >= 2));
    }

    #[test]
    fn detect_domains_counts_keyword_overlap() {
        let domains = vec![Domain {
            name: "payments".into(),
            description: "".into(),
            keywords: vec!["payment".into(), "stripe".into(), "checkout".into()],
        }];
        let keywords = vec!["payment".to_string(), "stripe".to_string(), "unrelated".to_string()];
        let (names, weights) = detect_domains(&keywords, &domains);
        assert_eq!(names, vec!["payments".to_string()]);
        assert_eq!(weights["payments"], 2.0);
    }

    #[test]
    fn change_type_defaults_to_unknown_when_no_hits() {
        let words = tokenize_raw_words("make the sky blue today");
        assert_eq!(detect_change_type(&words), ChangeType::Unknown);
    }

    #[test]
    fn change_type_detects_bugfix() {
        let words = tokenize_raw_words("fix crash when loading user profile");
        assert_eq!(detect_change_type(&words), ChangeType::Bugfix);
    }
}
