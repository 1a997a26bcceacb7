//! `.context/` workspace-layout helpers: store/pack paths, `project.json` and
//! `domains.json` (de)serialization, `.ctxignore` generation, pack slug
//! derivation, and `ctx.json` serialization (§6).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{Candidate, CtxFileEntry, CtxJson, Domain, Excerpt, ResolvedTask};

const CTXIGNORE_HEADER: &str = "# Generated by ctxpack init. Edit freely; re-running init merges rule blocks again.\n";

pub fn context_dir(root: &Path) -> PathBuf {
    root.join(".context")
}

pub fn store_path(root: &Path) -> PathBuf {
    context_dir(root).join("index.db")
}

pub fn project_json_path(root: &Path) -> PathBuf {
    context_dir(root).join("project.json")
}

pub fn domains_json_path(root: &Path) -> PathBuf {
    context_dir(root).join("domains.json")
}

pub fn ctxignore_path(root: &Path) -> PathBuf {
    root.join(".ctxignore")
}

pub fn packs_dir(root: &Path) -> PathBuf {
    context_dir(root).join("packs")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(rename = "detectedAt")]
    pub detected_at: String,
    #[serde(rename = "activeDiscoveries")]
    pub active_discoveries: Vec<String>,
}

impl ProjectConfig {
    pub fn new(active_discoveries: Vec<String>) -> Self {
        Self { detected_at: Utc::now().to_rfc3339(), active_discoveries }
    }

    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = project_json_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = project_json_path(root);
        std::fs::create_dir_all(context_dir(root))?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainOverrides {
    #[serde(rename = "customDomains")]
    pub custom_domains: Vec<Domain>,
    #[serde(rename = "disabledDomains")]
    pub disabled_domains: Vec<String>,
}

impl DomainOverrides {
    pub fn load(root: &Path) -> Result<Self> {
        let path = domains_json_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = domains_json_path(root);
        std::fs::create_dir_all(context_dir(root))?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
    }

    /// Apply custom domains and disabled-domain filtering to a rule-contributed list.
    pub fn apply(&self, mut domains: Vec<Domain>) -> Vec<Domain> {
        domains.extend(self.custom_domains.iter().cloned());
        domains.retain(|d| !self.disabled_domains.iter().any(|name| name == &d.name));
        domains
    }
}

/// Concatenates the essential header with every matched rule's ignore block.
pub fn render_ctxignore(rule_blocks: &[String]) -> String {
    let mut out = String::from(CTXIGNORE_HEADER);
    for block in rule_blocks {
        if !block.is_empty() {
            out.push('\n');
            out.push_str(block);
            out.push('\n');
        }
    }
    out
}

pub fn write_ctxignore(root: &Path, rule_blocks: &[String]) -> Result<()> {
    let path = ctxignore_path(root);
    std::fs::write(&path, render_ctxignore(rule_blocks)).with_context(|| format!("writing {}", path.display()))
}

pub fn read_ctxignore(root: &Path) -> Option<String> {
    std::fs::read_to_string(ctxignore_path(root)).ok()
}

/// `YYYYMMDD-HHMMSS-<task-slug>`: slug lowercased, non-alphanumerics collapsed
/// to a single `-`, trimmed to 40 chars.
pub fn pack_slug(task_text: &str, now: chrono::DateTime<Utc>) -> String {
    let timestamp = now.format("%Y%m%d-%H%M%S").to_string();
    let slug = slugify(task_text);
    format!("{timestamp}-{slug}")
}

fn slugify(text: &str) -> String {
    let mut out = String::new();
    let mut last_was_dash = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    trimmed.chars().take(40).collect::<String>().trim_end_matches('-').to_string()
}

pub fn pack_dir(root: &Path, slug: &str) -> PathBuf {
    packs_dir(root).join(slug)
}

/// `budgetTokens ≈ sum(excerpt.content.length) / 4`, a coarse chars-per-token estimate.
fn estimate_budget_tokens(excerpts: &[Excerpt]) -> usize {
    excerpts.iter().map(|e| e.content.len()).sum::<usize>() / 4
}

pub fn build_ctx_json(slug: &str, task: &ResolvedTask, candidates: &[Candidate], excerpts: &[Excerpt], now: chrono::DateTime<Utc>) -> CtxJson {
    CtxJson {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now.to_rfc3339(),
        slug: slug.to_string(),
        task: task.clone(),
        files: candidates
            .iter()
            .map(|c| CtxFileEntry { path: c.path.clone(), score: c.score, reasons: c.reasons.clone() })
            .collect(),
        budget_tokens: estimate_budget_tokens(excerpts),
        tags: task.domains.clone(),
    }
}

pub fn write_ctx_json(pack_dir: &Path, ctx: &CtxJson) -> Result<()> {
    std::fs::create_dir_all(pack_dir)?;
    let path = pack_dir.join("ctx.json");
    let content = serde_json::to_string_pretty(ctx)?;
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_non_alphanumerics_and_trims_length() {
        let slug = slugify("Fix Bug!! In   UserController (urgent)");
        assert_eq!(slug, "fix-bug-in-usercontroller-urgent");
    }

    #[test]
    fn slugify_caps_at_forty_chars() {
        let long = "a".repeat(100);
        assert!(slugify(&long).len() <= 40);
    }

    #[test]
    fn pack_slug_has_timestamp_prefix() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-07-28T10:30:00Z").unwrap().with_timezone(&Utc);
        let slug = pack_slug("Fix login bug", now);
        assert!(slug.starts_with("20260728-103000-"));
    }

    #[test]
    fn domain_overrides_filters_disabled_and_adds_custom() {
        let overrides = DomainOverrides {
            custom_domains: vec![Domain { name: "extra".into(), description: "d".into(), keywords: vec![] }],
            disabled_domains: vec!["payments".into()],
        };
        let base = vec![Domain { name: "payments".into(), description: "d".into(), keywords: vec![] }];
        let result = overrides.apply(base);
        assert!(result.iter().any(|d| d.name == "extra"));
        assert!(!result.iter().any(|d| d.name == "payments"));
    }
}
