//! texguard - rule-based detection and auto-fix for LaTeX projects
//!
//! texguard runs families of rules (BiDi, tables, bibliography, code
//! listings, typesetting logs) over documents. Large files are split into
//! overlapping chunks and checked in parallel; fixes are applied per family
//! and, where a family validates, confirmed by re-detection. Every family
//! run leaves evidence that its required detectors actually executed.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): issues, chunks, results, configuration
//!   and the `Detector` / `Fixer` ports
//! - **Service Layer** (`services`): chunker, batch processor, detection
//!   verifier, resource manager and the orchestrators
//! - **Adapters** (`adapters`): the built-in rule families
//! - **Infrastructure Layer** (`infrastructure`): configuration loading,
//!   logging and the cross-process project lock
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use texguard::{Config, EngineContext, SuperOrchestrator};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let context = Arc::new(EngineContext::new(Config::default())?);
//! let result = SuperOrchestrator::new(context)
//!     .run("שלום API\n", "intro.tex", None, true)
//!     .await?;
//! assert!(result.content.contains("\\en{API}"));
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{FamilyCatalog, RuleInfo};
pub use domain::models::{
    Chunk, ChunkResult, ChunkingConfig, Config, Issue, OrchestrationResult, ProjectResult,
    RunPhase, RunStatus, Severity, SuperResult, Verdict,
};
pub use domain::ports::{DetectionScope, Detector, Fixer};
pub use domain::{DomainError, DomainResult, LockError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    BatchProcessor, Chunker, DetectionVerifier, EngineContext, FamilyDefinition,
    FamilyOrchestrator, ResourceManager, SuperOrchestrator,
};
