//! Engine services: chunking, batch processing, verification, locking
//! and orchestration.

pub mod batch_processor;
pub mod chunker;
pub mod context;
pub mod detection_verifier;
pub mod family_orchestrator;
pub mod resource_manager;
pub mod super_orchestrator;

pub use batch_processor::{dedup_issues, BatchProcessor, ChunkProcessor};
pub use chunker::Chunker;
pub use context::EngineContext;
pub use detection_verifier::{DetectionVerifier, VerificationReport, FAMILY_REQUIREMENTS};
pub use family_orchestrator::{FamilyDefinition, FamilyOrchestrator};
pub use resource_manager::{LockGuard, ResourceManager};
pub use super_orchestrator::{SuperOrchestrator, DEFAULT_AGENT_ID};
