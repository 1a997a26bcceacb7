//! Multilingual stem normalisation, synonym groups, and pivot-language
//! translation (§4.8). English is the pivot: non-pivot languages only
//! contribute source→pivot translation pairs, and the expansion closure
//! reroutes through the pivot's synonym groups.

use std::collections::{HashMap, HashSet};

use rust_stemmers::{Algorithm, Stemmer};

const PIVOT: &str = "en";

struct LanguageEntry {
    stemmer: Stemmer,
    /// Each group is a set of mutually expanding terms (stems or literal words).
    synonym_groups: Vec<HashSet<String>>,
    /// Non-pivot only: (source stem -> pivot stem).
    translations: Vec<(String, String)>,
}

pub struct SynonymEngine {
    languages: HashMap<&'static str, LanguageEntry>,
}

impl Default for SynonymEngine {
    fn default() -> Self {
        let mut engine = SynonymEngine { languages: HashMap::new() };
        engine.register_english();
        engine.register_spanish();
        engine.register_french();
        engine.register_german();
        engine
    }
}

impl SynonymEngine {
    fn register(
        &mut self,
        lang: &'static str,
        algorithm: Algorithm,
        synonym_groups: Vec<&[&str]>,
        translations: Vec<(&str, &str)>,
    ) {
        self.languages.insert(
            lang,
            LanguageEntry {
                stemmer: Stemmer::create(algorithm),
                synonym_groups: synonym_groups
                    .into_iter()
                    .map(|group| group.iter().map(|s| s.to_string()).collect())
                    .collect(),
                translations: translations
                    .into_iter()
                    .map(|(a, b)| (a.to_string(), b.to_string()))
                    .collect(),
            },
        );
    }

    fn register_english(&mut self) {
        self.register(
            PIVOT,
            Algorithm::English,
            vec![
                &["fix", "bug", "patch", "repair"],
                &["add", "create", "implement", "introduce"],
                &["remove", "delete", "drop"],
                &["update", "change", "modify", "edit"],
                &["error", "exception", "fault", "failure"],
                &["auth", "authentication", "login", "signin"],
                &["config", "configuration", "settings"],
                &["user", "account", "member"],
                &["pay", "payment", "billing", "checkout"],
                &["test", "spec", "tests"],
            ],
            vec![],
        );
    }

    fn register_spanish(&mut self) {
        self.register(
            "es",
            Algorithm::Spanish,
            vec![&["arreglar", "reparar", "corregir"], &["agregar", "anadir", "crear"]],
            vec![
                ("arregl", "fix"),
                ("repar", "fix"),
                ("corrig", "fix"),
                ("agreg", "add"),
                ("anad", "add"),
                ("cre", "add"),
                ("usuari", "user"),
                ("pag", "pay"),
                ("err", "error"),
            ],
        );
    }

    fn register_french(&mut self) {
        self.register(
            "fr",
            Algorithm::French,
            vec![&["corriger", "reparer"], &["ajouter", "creer"]],
            vec![
                ("corrig", "fix"),
                ("repar", "fix"),
                ("ajout", "add"),
                ("cre", "add"),
                ("utilisateur", "user"),
                ("paiement", "pay"),
                ("erreur", "error"),
            ],
        );
    }

    fn register_german(&mut self) {
        self.register(
            "de",
            Algorithm::German,
            vec![&["beheben", "reparieren"], &["hinzufugen", "erstellen"]],
            vec![
                ("beheb", "fix"),
                ("repari", "fix"),
                ("hinzufug", "add"),
                ("erstell", "add"),
                ("benutz", "user"),
                ("zahl", "pay"),
                ("fehl", "error"),
            ],
        );
    }

    fn stem_in(&self, lang: &str, term: &str) -> Option<String> {
        self.languages.get(lang).map(|entry| entry.stemmer.stem(term).to_string())
    }

    /// Lowercase `term`; compute stems in every registered language; look up
    /// exact and stem keys in every language's synonym index; translate
    /// non-pivot stems to the pivot and re-expand through the pivot's
    /// synonym groups; return the transitive closure (including `term` itself).
    pub fn expand(&self, term: &str) -> HashSet<String> {
        let lower = term.to_lowercase();
        let mut closure: HashSet<String> = HashSet::new();
        closure.insert(lower.clone());

        let mut pivot_stems: HashSet<String> = HashSet::new();
        if let Some(s) = self.stem_in(PIVOT, &lower) {
            pivot_stems.insert(s);
        }

        for (&lang, entry) in &self.languages {
            let stem = entry.stemmer.stem(&lower).to_string();
            closure.extend(self.terms_matching(lang, &lower, &stem));

            if lang != PIVOT {
                for (source_stem, pivot_stem) in &entry.translations {
                    if *source_stem == stem {
                        pivot_stems.insert(pivot_stem.clone());
                    }
                }
            }
        }

        for pivot_stem in pivot_stems {
            closure.extend(self.terms_matching(PIVOT, &pivot_stem, &pivot_stem));
        }

        closure
    }

    /// All members of any synonym group in `lang` whose set contains `exact`
    /// or `stem` (as literal or stemmed member).
    fn terms_matching(&self, lang: &str, exact: &str, stem: &str) -> HashSet<String> {
        let Some(entry) = self.languages.get(lang) else { return HashSet::new() };
        let mut out = HashSet::new();
        for group in &entry.synonym_groups {
            let hit = group.iter().any(|member| {
                member == exact || member == stem || entry.stemmer.stem(member) == stem
            });
            if hit {
                out.extend(group.iter().cloned());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_includes_term_itself() {
        let engine = SynonymEngine::default();
        let expanded = engine.expand("fix");
        assert!(expanded.contains("fix"));
    }

    #[test]
    fn expand_pulls_in_english_synonym_group() {
        let engine = SynonymEngine::default();
        let expanded = engine.expand("bug");
        assert!(expanded.contains("fix") || expanded.contains("patch"));
    }

    #[test]
    fn expand_routes_non_pivot_stem_through_pivot_group() {
        let engine = SynonymEngine::default();
        let expanded = engine.expand("arreglar");
        assert!(expanded.contains("fix") || expanded.contains("bug"));
    }

    #[test]
    fn expand_is_case_insensitive() {
        let engine = SynonymEngine::default();
        assert_eq!(engine.expand("Bug"), engine.expand("bug"));
    }
}
