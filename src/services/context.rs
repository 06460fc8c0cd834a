//! Engine context: configuration, lock table and rule catalog, bundled
//! and passed explicitly to the orchestrators.

use std::sync::{Arc, OnceLock};

use crate::adapters::rules::FamilyCatalog;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Config;
use crate::services::batch_processor::BatchProcessor;
use crate::services::chunker::Chunker;
use crate::services::resource_manager::ResourceManager;

/// Process-wide context, for callers that want one.
static GLOBAL_CONTEXT: OnceLock<Arc<EngineContext>> = OnceLock::new();

/// Everything an orchestration run needs besides its input.
#[derive(Debug)]
pub struct EngineContext {
    config: Config,
    chunker: Chunker,
    resources: Arc<ResourceManager>,
    catalog: FamilyCatalog,
}

impl EngineContext {
    /// Context with the built-in rule families.
    pub fn new(config: Config) -> DomainResult<Self> {
        let catalog = FamilyCatalog::builtin(&config.thresholds)?;
        Self::with_catalog(config, catalog)
    }

    /// Context with a caller-supplied rule catalog.
    pub fn with_catalog(config: Config, catalog: FamilyCatalog) -> DomainResult<Self> {
        let chunker = Chunker::with_config(config.chunking.clone())?;
        Ok(Self {
            config,
            chunker,
            resources: Arc::new(ResourceManager::new()),
            catalog,
        })
    }

    /// Install `context` as the process-wide context. Fails if one is
    /// already installed.
    pub fn init_global(context: EngineContext) -> DomainResult<Arc<EngineContext>> {
        let context = Arc::new(context);
        GLOBAL_CONTEXT
            .set(Arc::clone(&context))
            .map_err(|_| DomainError::ContextAlreadyInitialized)?;
        Ok(context)
    }

    /// The process-wide context, if one was installed.
    pub fn global() -> Option<Arc<EngineContext>> {
        GLOBAL_CONTEXT.get().cloned()
    }

    /// The process-wide context, created from default configuration on
    /// first use.
    pub fn shared() -> DomainResult<Arc<EngineContext>> {
        if let Some(context) = Self::global() {
            return Ok(context);
        }
        let context = Arc::new(Self::new(Config::default())?);
        // Another caller may have won the race; theirs is the one to use.
        Ok(Arc::clone(GLOBAL_CONTEXT.get_or_init(|| context)))
    }

    /// Validated configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Chunker built from the chunking config.
    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Batch processor bounded by `batch.max_workers`.
    pub fn batch_processor(&self) -> BatchProcessor {
        BatchProcessor::new(self.config.batch.max_workers)
    }

    /// Lock table shared by every orchestrator using this context.
    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    /// Rule families available to runs.
    pub fn catalog(&self) -> &FamilyCatalog {
        &self.catalog
    }

    /// Whether `family` is enabled by configuration.
    pub fn is_enabled(&self, family: &str) -> bool {
        self.config.families.iter().any(|f| f == family)
    }

    /// Clear run-spanning state (held locks). For test isolation.
    pub fn reset(&self) {
        self.resources.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChunkingConfig;

    #[test]
    fn test_new_uses_builtin_catalog() {
        let context = EngineContext::new(Config::default()).unwrap();
        assert_eq!(context.catalog().names().len(), 5);
        assert!(context.is_enabled("BiDi"));
        assert_eq!(context.batch_processor().max_workers(), 4);
    }

    #[test]
    fn test_rejects_invalid_chunking() {
        let config = Config {
            chunking: ChunkingConfig::new(10, 10),
            ..Config::default()
        };
        assert!(matches!(
            EngineContext::new(config),
            Err(DomainError::InvalidChunk(_))
        ));
    }

    #[test]
    fn test_shared_returns_same_instance() {
        let a = EngineContext::shared().unwrap();
        let b = EngineContext::shared().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reset_releases_locks() {
        let context = EngineContext::new(Config::default()).unwrap();
        assert!(context.resources().try_acquire("proj", "agent1"));
        context.reset();
        assert!(!context.resources().is_locked("proj"));
    }
}
