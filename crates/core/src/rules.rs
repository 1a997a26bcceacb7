//! Closed, compile-time Domain/Rule Registry (§4.12, §9 design note: "a tagged
//! variant with a fixed shape, not a dynamic loader"). Built-in rules: a
//! generic rule (suffix-based related-file families) and framework-aware rules
//! keyed off manifest files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::types::{CandidateSignals, Domain};

const KNOWN_SUFFIXES: &[&str] =
    &["Controller", "Service", "Repository", "Model", "Handler", "Middleware", "Factory"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Generic,
    NodeJs,
    PhpLaravel,
}

const ALL_RULES: &[RuleKind] = &[RuleKind::Generic, RuleKind::NodeJs, RuleKind::PhpLaravel];

impl RuleKind {
    pub fn name(self) -> &'static str {
        match self {
            RuleKind::Generic => "generic",
            RuleKind::NodeJs => "nodejs",
            RuleKind::PhpLaravel => "php-laravel",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RuleKind::Generic => "Universal patterns: related-file families by naming suffix",
            RuleKind::NodeJs => "Node/JS ecosystem keyed off package.json",
            RuleKind::PhpLaravel => "PHP web framework (Laravel) keyed off composer.json",
        }
    }

    /// Weight is advisory metadata surfaced to callers (e.g. `domains list`);
    /// it does not participate in scoring directly.
    pub fn weight(self) -> f64 {
        match self {
            RuleKind::Generic => 1.0,
            RuleKind::NodeJs => 1.0,
            RuleKind::PhpLaravel => 1.0,
        }
    }

    pub fn ignore_patterns(self) -> &'static str {
        match self {
            RuleKind::Generic => "",
            RuleKind::NodeJs => "node_modules/\ndist/\nbuild/\nout/\n.next/\n.nuxt/\n.output/\ncoverage/\n.nyc_output/\n.cache/\n.parcel-cache/\n.turbo/\n",
            RuleKind::PhpLaravel => "vendor/\nstorage/framework/\nstorage/logs/\nbootstrap/cache/\n",
        }
    }

    pub fn applies_to(self, root: &Path) -> bool {
        match self {
            RuleKind::Generic => true,
            RuleKind::NodeJs => root.join("package.json").is_file(),
            RuleKind::PhpLaravel => root.join("composer.json").is_file()
                && std::fs::read_to_string(root.join("composer.json"))
                    .map(|s| s.contains("laravel/framework"))
                    .unwrap_or(false),
        }
    }

    pub fn domains(self) -> Vec<Domain> {
        match self {
            RuleKind::Generic => vec![],
            RuleKind::NodeJs => node_domains(),
            RuleKind::PhpLaravel => vec![Domain {
                name: "laravel".into(),
                description: "Laravel MVC conventions".into(),
                keywords: vec![
                    "controller".into(),
                    "eloquent".into(),
                    "migration".into(),
                    "blade".into(),
                    "artisan".into(),
                    "middleware".into(),
                ],
            }],
        }
    }

    pub fn discover(self, indexed_paths: &[String]) -> HashMap<String, CandidateSignals> {
        match self {
            RuleKind::Generic => generic_discover(indexed_paths),
            RuleKind::NodeJs => node_discover(indexed_paths),
            RuleKind::PhpLaravel => laravel_discover(indexed_paths),
        }
    }
}

/// The Node.js domains and their keyword lists, carried over from the
/// original TypeScript source's Node rule (express, prisma, nextjs, nestjs,
/// react, redux, vue, graphql) rather than the single generic "one rule for
/// the Node/JS ecosystem" spec.md gestures at.
fn node_domains() -> Vec<Domain> {
    vec![
        Domain {
            name: "express".into(),
            description: "Express.js routing and middleware".into(),
            keywords: vec!["express".into(), "router".into(), "middleware".into(), "req".into(), "res".into()],
        },
        Domain {
            name: "prisma".into(),
            description: "Prisma ORM schema and client".into(),
            keywords: vec!["prisma".into(), "schema".into(), "migration".into(), "orm".into()],
        },
        Domain {
            name: "nextjs".into(),
            description: "Next.js pages and app router".into(),
            keywords: vec!["next".into(), "getserversideprops".into(), "getstaticprops".into(), "app router".into()],
        },
        Domain {
            name: "nestjs".into(),
            description: "NestJS modules, controllers, providers".into(),
            keywords: vec!["nest".into(), "injectable".into(), "module".into(), "provider".into()],
        },
        Domain {
            name: "react".into(),
            description: "React components and hooks".into(),
            keywords: vec!["react".into(), "usestate".into(), "useeffect".into(), "component".into(), "jsx".into()],
        },
        Domain {
            name: "redux".into(),
            description: "Redux state management".into(),
            keywords: vec!["redux".into(), "reducer".into(), "dispatch".into(), "action".into(), "store".into()],
        },
        Domain {
            name: "vue".into(),
            description: "Vue components and composition API".into(),
            keywords: vec!["vue".into(), "composable".into(), "ref".into(), "reactive".into(), "pinia".into()],
        },
        Domain {
            name: "graphql".into(),
            description: "GraphQL schema and resolvers".into(),
            keywords: vec!["graphql".into(), "resolver".into(), "query".into(), "mutation".into(), "schema".into()],
        },
    ]
}

fn set_signal(
    out: &mut HashMap<String, CandidateSignals>,
    path: &str,
    f: impl FnOnce(&mut CandidateSignals),
) {
    let mut sig = CandidateSignals::default();
    f(&mut sig);
    out.entry(path.to_string()).or_default().merge(&sig);
}

fn file_stem(path: &str) -> String {
    Path::new(path).file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

fn strip_known_suffix(stem: &str) -> Option<&str> {
    KNOWN_SUFFIXES.iter().find_map(|suf| {
        if stem.len() > suf.len() && stem.ends_with(suf) {
            Some(&stem[..stem.len() - suf.len()])
        } else {
            None
        }
    })
}

/// Groups files sharing a base name once a known suffix (`Controller`,
/// `Service`, `Repository`, ...) is stripped, and marks every member of a
/// group of 2+ as `related_file` to every other member.
fn generic_discover(indexed_paths: &[String]) -> HashMap<String, CandidateSignals> {
    let mut groups: HashMap<String, Vec<&str>> = HashMap::new();
    for path in indexed_paths {
        let stem = file_stem(path);
        if let Some(base) = strip_known_suffix(&stem) {
            groups.entry(base.to_lowercase()).or_default().push(path.as_str());
        }
    }
    let mut out = HashMap::new();
    for paths in groups.values() {
        if paths.len() < 2 {
            continue;
        }
        for path in paths {
            set_signal(&mut out, path, |s| s.related_file = true);
        }
    }
    out
}

const TEST_MARKERS: &[&str] = &[".test.", ".spec.", "__tests__/"];

fn node_discover(indexed_paths: &[String]) -> HashMap<String, CandidateSignals> {
    let mut out = HashMap::new();

    // discoverTestFiles
    for path in indexed_paths {
        if TEST_MARKERS.iter().any(|m| path.contains(m)) {
            set_signal(&mut out, path, |s| s.test_file = true);
        }
    }

    // discoverIndexExports: an index.{ts,js,tsx,jsx} re-exports its directory's
    // siblings, so every sibling is related to it.
    let index_names = ["index.ts", "index.js", "index.tsx", "index.jsx"];
    let mut by_dir: HashMap<PathBuf, Vec<&str>> = HashMap::new();
    for path in indexed_paths {
        let dir = Path::new(path).parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        by_dir.entry(dir).or_default().push(path.as_str());
    }
    for (dir, siblings) in &by_dir {
        let has_index = siblings.iter().any(|p| {
            let name = Path::new(p).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            index_names.contains(&name.as_str())
        });
        if !has_index {
            continue;
        }
        for sibling in siblings {
            let name = Path::new(sibling).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            if index_names.contains(&name.as_str()) {
                continue;
            }
            set_signal(&mut out, sibling, |s| s.related_file = true);
        }
        let _ = dir;
    }
    out
}

/// Laravel MVC conventions: Controller↔View, Route↔Controller, Model↔Migration/
/// Factory, Request↔Controller, matched by shared base name across the
/// convention directories.
fn laravel_discover(indexed_paths: &[String]) -> HashMap<String, CandidateSignals> {
    let mut out = HashMap::new();
    let bases: Vec<(String, &str)> = indexed_paths
        .iter()
        .map(|p| (file_stem(p).to_lowercase(), p.as_str()))
        .collect();

    for (base, path) in &bases {
        if !path.contains("Controllers/") {
            continue;
        }
        let controller_base = base.strip_suffix("controller").unwrap_or(base);
        for (other_base, other_path) in &bases {
            if other_path == path {
                continue;
            }
            let is_view = other_path.contains("views/") || other_path.contains("resources/views/");
            let is_model = other_path.contains("Models/");
            let is_request = other_path.contains("Requests/");
            let related = (is_view || is_model || is_request)
                && (other_base.contains(controller_base) || controller_base.contains(other_base.as_str()))
                && !controller_base.is_empty();
            if related {
                set_signal(&mut out, path, |s| s.related_file = true);
                set_signal(&mut out, other_path, |s| s.related_file = true);
            }
        }
    }
    out
}

pub struct RuleRegistry {
    matched: Vec<RuleKind>,
}

impl RuleRegistry {
    pub fn probe(root: &Path) -> Self {
        let matched = ALL_RULES.iter().copied().filter(|rule| rule.applies_to(root)).collect();
        RuleRegistry { matched }
    }

    pub fn from_names(names: &[String]) -> Self {
        let matched = ALL_RULES.iter().copied().filter(|r| names.iter().any(|n| n == r.name())).collect();
        RuleRegistry { matched }
    }

    pub fn matched_names(&self) -> Vec<String> {
        self.matched.iter().map(|r| r.name().to_string()).collect()
    }

    pub fn merged_ctx_ignore(&self) -> String {
        self.matched.iter().map(|r| r.ignore_patterns()).filter(|b| !b.is_empty()).collect::<Vec<_>>().join("\n")
    }

    pub fn all_domains(&self) -> Vec<Domain> {
        self.matched.iter().flat_map(|r| r.domains()).collect()
    }

    pub fn discover_all(&self, indexed_paths: &[String]) -> HashMap<String, CandidateSignals> {
        let mut merged: HashMap<String, CandidateSignals> = HashMap::new();
        for rule in &self.matched {
            for (path, signals) in rule.discover(indexed_paths) {
                merged.entry(path).or_default().merge(&signals);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_rule_applies_always() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuleKind::Generic.applies_to(dir.path()));
    }

    #[test]
    fn nodejs_rule_requires_package_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!RuleKind::NodeJs.applies_to(dir.path()));
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert!(RuleKind::NodeJs.applies_to(dir.path()));
    }

    #[test]
    fn generic_discover_relates_controller_and_service() {
        let paths = vec![
            "app/UserController.php".to_string(),
            "app/UserService.php".to_string(),
            "app/Unrelated.php".to_string(),
        ];
        let signals = generic_discover(&paths);
        assert!(signals.get("app/UserController.php").unwrap().related_file);
        assert!(signals.get("app/UserService.php").unwrap().related_file);
        assert!(!signals.contains_key("app/Unrelated.php"));
    }

    #[test]
    fn node_discover_marks_test_files_and_index_siblings() {
        let paths = vec![
            "src/user.test.ts".to_string(),
            "src/index.ts".to_string(),
            "src/helpers.ts".to_string(),
        ];
        let signals = node_discover(&paths);
        assert!(signals.get("src/user.test.ts").unwrap().test_file);
        assert!(signals.get("src/helpers.ts").unwrap().related_file);
    }

    #[test]
    fn registry_merges_matched_rule_discoveries() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RuleRegistry::probe(dir.path());
        assert!(registry.matched_names().contains(&"generic".to_string()));
    }
}
