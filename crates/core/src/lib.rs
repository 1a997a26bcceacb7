//! Core library for a repository-local context packer: indexes a codebase once,
//! then resolves natural-language tasks (optionally with a stacktrace, a diff
//! reference, or explicit file/symbol hints) into a ranked, excerpted set of
//! source files for an AI coding agent to consume.

pub mod diff;
pub mod discovery;
pub mod excerpt;
pub mod ignore_matcher;
pub mod imports;
pub mod indexer;
pub mod keywords;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod scorer;
pub mod stacktrace;
pub mod stemmer;
pub mod store;
pub mod symbols;
pub mod types;
pub mod vcs;
pub mod workspace;

pub use ignore_matcher::IgnoreMatcher;
pub use indexer::Indexer;
pub use resolver::{pack, resolve_task, PackResult, TaskInput};
pub use rules::RuleRegistry;
pub use store::Store;
pub use types::{Candidate, CtxJson, ResolvedTask, ScanConfig};
