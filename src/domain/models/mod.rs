//! Domain models: issues, chunks, verification records, locks, run
//! results and configuration.

pub mod chunking;
pub mod config;
pub mod issue;
pub mod lock;
pub mod orchestration;
pub mod verification;

pub use chunking::{Chunk, ChunkResult, ChunkingConfig};
pub use config::{
    BatchConfig, Config, LockingConfig, LoggingConfig, ProjectConfig, ThresholdsConfig,
    KNOWN_FAMILIES,
};
pub use issue::{Issue, IssueKey, Severity};
pub use lock::LockRecord;
pub use orchestration::{
    FileFailure, OrchestrationResult, ProjectResult, RunPhase, RunStatus, SuperResult, Verdict,
};
pub use verification::{DetectionEvidence, FamilyVerification};
