//! Source registry — the set of chains the engine polls.

use std::collections::HashSet;

use crate::config::Source;
use crate::error::ConfigError;

/// Insertion-ordered registry of [`Source`]s, unique by chain id.
///
/// Ordering affects polling fairness only, not correctness.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
    chain_ids: HashSet<u64>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of sources, rejecting duplicates.
    pub fn from_sources(sources: impl IntoIterator<Item = Source>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for source in sources {
            registry.register(source)?;
        }
        Ok(registry)
    }

    /// Register a source. Fails with [`ConfigError::DuplicateChainId`] if a
    /// source with the same chain id is already present.
    pub fn register(&mut self, source: Source) -> Result<(), ConfigError> {
        if !self.chain_ids.insert(source.chain_id) {
            return Err(ConfigError::DuplicateChainId {
                chain_id: source.chain_id,
            });
        }
        self.sources.push(source);
        Ok(())
    }

    /// All registered sources, in insertion order.
    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    /// Look up a source by chain id.
    pub fn get(&self, chain_id: u64) -> Option<&Source> {
        self.sources.iter().find(|s| s.chain_id == chain_id)
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
