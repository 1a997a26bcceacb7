//! ctxpack CLI — initializes, indexes, and packs task-relevant context from a
//! repository. Calls `ctxpack-core` directly with no server overhead.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ctxpack_core::ignore_matcher::IgnoreMatcher;
use ctxpack_core::rules::RuleRegistry;
use ctxpack_core::types::{Domain, ScanConfig};
use ctxpack_core::workspace::{self, DomainOverrides, ProjectConfig};
use ctxpack_core::{resolver, Indexer, Store, TaskInput};

#[derive(Parser)]
#[command(name = "ctxpack", version, about = "Pack task-relevant context from a repository")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize ctxpack in a project: probes rules, writes project.json and .ctxignore
    Init {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Overwrite an existing project.json / .ctxignore
        #[arg(long)]
        force: bool,
    },
    /// Build or refresh the index
    Index {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,
    },
    /// Resolve a task and pack a ranked set of excerpted files
    Pack {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Natural-language task description
        #[arg(long)]
        task: Option<String>,

        /// Path to a log file with a stack trace
        #[arg(long)]
        error: Option<PathBuf>,

        /// Only include stacktrace lines from the last `Nmhd` window
        #[arg(long)]
        since: Option<String>,

        /// Diff against this VCS reference
        #[arg(long)]
        diff: Option<String>,

        /// Explicit file hint (repeatable)
        #[arg(long = "file")]
        file: Vec<String>,

        /// Explicit symbol hint (repeatable)
        #[arg(long = "symbol")]
        symbol: Vec<String>,

        /// Maximum number of files in the result
        #[arg(long = "max-files")]
        max_files: Option<usize>,

        #[arg(short, long)]
        verbose: bool,
    },
    /// List recent packs
    List {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Open a file from the index or from a previous pack
    Open {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long = "file")]
        file: Option<String>,

        #[arg(long)]
        pack: Option<String>,
    },
    /// Manage the domain registry
    Domains {
        #[command(subcommand)]
        action: DomainAction,

        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DomainAction {
    /// List active domains (core + framework + custom, minus disabled)
    List,
    /// Add a custom domain
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },
    /// Remove a custom domain
    Remove { name: String },
    /// Re-enable a disabled domain
    Enable { name: String },
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = root.unwrap_or_else(|| std::env::current_dir().expect("could not determine current directory"));
    root.canonicalize().with_context(|| format!("resolving project root {}", root.display()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ctxpack=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { root, force } => cmd_init(root, force, cli.json),
        Commands::Index { root, verbose } => cmd_index(root, verbose, cli.json),
        Commands::Pack { root, task, error, since, diff, file, symbol, max_files, verbose } => {
            cmd_pack(root, task, error, since, diff, file, symbol, max_files, verbose, cli.json)
        }
        Commands::List { root, limit } => cmd_list(root, limit, cli.json),
        Commands::Open { root, file, pack } => cmd_open(root, file, pack),
        Commands::Domains { action, root } => cmd_domains(action, root, cli.json),
    }
}

fn cmd_init(root: Option<PathBuf>, force: bool, json: bool) -> Result<()> {
    let root = resolve_root(root)?;
    let project_path = workspace::project_json_path(&root);
    if project_path.exists() && !force {
        bail!("already initialised at {} (use --force to overwrite)", project_path.display());
    }

    let registry = RuleRegistry::probe(&root);
    let matched = registry.matched_names();

    ProjectConfig::new(matched.clone()).save(&root)?;
    workspace::write_ctxignore(&root, &[registry.merged_ctx_ignore()])?;

    if json {
        println!("{}", serde_json::json!({ "matchedRules": matched }));
    } else {
        println!("Initialised ctxpack at {}", root.display());
        println!("Matched rules: {}", matched.join(", "));
    }
    Ok(())
}

fn cmd_index(root: Option<PathBuf>, verbose: bool, json: bool) -> Result<()> {
    let root = resolve_root(root)?;
    if verbose {
        eprintln!("indexing {}", root.display());
    }

    let registry = RuleRegistry::probe(&root);
    let ignore_block = registry.merged_ctx_ignore();
    let user_ignore = workspace::read_ctxignore(&root).unwrap_or_default();
    let ignore = IgnoreMatcher::build(&root, &[ignore_block, user_ignore]);

    let store = Store::open(&workspace::store_path(&root))?;
    let indexer = Indexer::new(&store, ScanConfig::new(root.clone()));
    indexer.run(&ignore)?;

    let stats = store.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("files: {}  symbols: {}  imports: {}  vcs signals: {}", stats.files, stats.symbols, stats.imports, stats.vcs_signals);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_pack(
    root: Option<PathBuf>,
    task: Option<String>,
    error: Option<PathBuf>,
    since: Option<String>,
    diff: Option<String>,
    file: Vec<String>,
    symbol: Vec<String>,
    max_files: Option<usize>,
    verbose: bool,
    json: bool,
) -> Result<()> {
    let root = resolve_root(root)?;
    let task_text = task.unwrap_or_default();
    if task_text.is_empty() && file.is_empty() && error.is_none() {
        bail!("no input: provide --task, --file, or --error");
    }

    let stacktrace_text = match &error {
        Some(path) => Some(std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?),
        None => None,
    };

    let registry = RuleRegistry::probe(&root);
    let overrides = DomainOverrides::load(&root)?;
    let ignore_block = registry.merged_ctx_ignore();
    let user_ignore = workspace::read_ctxignore(&root).unwrap_or_default();
    let ignore = IgnoreMatcher::build(&root, &[ignore_block, user_ignore]);
    let store = Store::open(&workspace::store_path(&root))?;

    if verbose {
        eprintln!("resolving task against {} indexed files", store.stats()?.files);
    }

    let active_domains = overrides.apply(registry.all_domains());
    let input = TaskInput { text: task_text.clone(), stacktrace_text, since, diff_ref: diff, file_hints: file, symbol_hints: symbol };
    let result = resolver::pack(&root, &store, &ignore, &registry, &active_domains, &input, max_files);

    let now = chrono::Utc::now();
    let slug = workspace::pack_slug(&task_text, now);
    let ctx = workspace::build_ctx_json(&slug, &result.task, &result.candidates, &result.excerpts, now);
    let pack_dir = workspace::pack_dir(&root, &slug);
    workspace::write_ctx_json(&pack_dir, &ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
    } else {
        println!("Pack: {slug}");
        println!("Change type: {}  Domains: {}", result.task.change_type.as_str(), result.task.domains.join(", "));
        for candidate in &result.candidates {
            println!("{:<60} {:>5.2}  {}", candidate.path, candidate.score, candidate.reasons.join("; "));
        }
    }
    Ok(())
}

fn cmd_list(root: Option<PathBuf>, limit: usize, json: bool) -> Result<()> {
    let root = resolve_root(root)?;
    let packs_dir = workspace::packs_dir(&root);
    let mut slugs: Vec<String> = std::fs::read_dir(&packs_dir)
        .with_context(|| format!("reading {}", packs_dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    slugs.sort();
    slugs.reverse();
    slugs.truncate(limit);

    if json {
        println!("{}", serde_json::json!({ "packs": slugs }));
    } else {
        for slug in &slugs {
            println!("{slug}");
        }
    }
    Ok(())
}

fn cmd_open(root: Option<PathBuf>, file: Option<String>, pack: Option<String>) -> Result<()> {
    let root = resolve_root(root)?;
    match (file, pack) {
        (Some(file), _) => {
            let full_path = root.join(&file);
            let content = std::fs::read_to_string(&full_path).with_context(|| format!("reading {}", full_path.display()))?;
            for (i, line) in content.lines().enumerate() {
                println!("{:>5} | {}", i + 1, line);
            }
            Ok(())
        }
        (None, Some(slug)) => {
            let ctx_path = workspace::pack_dir(&root, &slug).join("ctx.json");
            let content = std::fs::read_to_string(&ctx_path).with_context(|| format!("reading {}", ctx_path.display()))?;
            println!("{content}");
            Ok(())
        }
        (None, None) => bail!("specify --file or --pack"),
    }
}

fn cmd_domains(action: DomainAction, root: Option<PathBuf>, json: bool) -> Result<()> {
    let root = resolve_root(root)?;
    let registry = RuleRegistry::probe(&root);
    let mut overrides = DomainOverrides::load(&root)?;

    match action {
        DomainAction::List => {
            let active = overrides.apply(registry.all_domains());
            if json {
                println!("{}", serde_json::to_string_pretty(&active)?);
            } else {
                for domain in &active {
                    println!("{:<16} {}", domain.name, domain.description);
                }
            }
        }
        DomainAction::Add { name, description, keywords } => {
            overrides.custom_domains.push(Domain { name, description: description.unwrap_or_default(), keywords });
            overrides.save(&root)?;
        }
        DomainAction::Remove { name } => {
            overrides.custom_domains.retain(|d| d.name != name);
            overrides.save(&root)?;
        }
        DomainAction::Enable { name } => {
            overrides.disabled_domains.retain(|d| d != &name);
            overrides.save(&root)?;
        }
    }
    Ok(())
}
