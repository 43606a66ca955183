//! Corpora and the sources that back them
//!
//! A corpus is a named logical search domain backed by one or more sources.
//! The registry ([`Corpora`]) is built from configuration and knows which
//! corpora are enabled.

mod ranker;
mod result;
mod source;

pub use ranker::{CorpusRanker, DefaultCorpusRanker};
pub use result::CorpusResult;
pub use source::{Source, StaticSource};

use crate::config::CorpusConfig;
use crate::error::{QsbError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// A named search domain
pub trait Corpus: Send + Sync {
    /// Unique corpus name
    fn name(&self) -> &str;

    /// Sources queried for this corpus, in merge order
    fn sources(&self) -> &[Arc<dyn Source>];

    /// Whether the corpus is included in blended queries unless disabled
    fn is_enabled_by_default(&self) -> bool {
        true
    }

    /// Hidden corpora are still queried but not listed to users
    fn is_hidden(&self) -> bool {
        false
    }
}

/// Corpus assembled from configuration
pub struct ConfiguredCorpus {
    name: String,
    enabled_by_default: bool,
    hidden: bool,
    sources: Vec<Arc<dyn Source>>,
}

impl ConfiguredCorpus {
    pub fn new(
        name: impl Into<String>,
        enabled_by_default: bool,
        hidden: bool,
        sources: Vec<Arc<dyn Source>>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled_by_default,
            hidden,
            sources,
        }
    }

    /// Build a corpus and its static sources from a config section
    pub fn from_config(config: &CorpusConfig) -> Self {
        let sources = config
            .sources
            .iter()
            .map(|source| Arc::new(StaticSource::from_config(source)) as Arc<dyn Source>)
            .collect();

        Self::new(
            config.name.clone(),
            config.enabled_by_default,
            config.hidden,
            sources,
        )
    }
}

impl Corpus for ConfiguredCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    fn is_enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Registry of all known corpora
pub struct Corpora {
    corpora: Vec<Arc<dyn Corpus>>,
    enabled: HashSet<String>,
}

impl Corpora {
    /// Create a registry where the enabled set follows each corpus' default
    pub fn new(corpora: Vec<Arc<dyn Corpus>>) -> Self {
        let enabled = corpora
            .iter()
            .filter(|c| c.is_enabled_by_default())
            .map(|c| c.name().to_string())
            .collect();

        Self { corpora, enabled }
    }

    /// Build the registry from the `[[corpora]]` config sections
    pub fn from_config(configs: &[CorpusConfig]) -> Self {
        let corpora = configs
            .iter()
            .map(|c| Arc::new(ConfiguredCorpus::from_config(c)) as Arc<dyn Corpus>)
            .collect();

        let mut registry = Self::new(corpora);
        for config in configs {
            if let Some(enabled) = config.enabled {
                registry.set_enabled(&config.name, enabled);
            }
        }
        registry
    }

    /// All corpora in registration order
    pub fn all(&self) -> &[Arc<dyn Corpus>] {
        &self.corpora
    }

    /// Corpora included in blended queries
    pub fn enabled(&self) -> Vec<Arc<dyn Corpus>> {
        self.corpora
            .iter()
            .filter(|c| self.enabled.contains(c.name()))
            .cloned()
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.enabled.insert(name.to_string());
        } else {
            self.enabled.remove(name);
        }
    }

    /// Look up a corpus by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Corpus>> {
        self.corpora
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| QsbError::UnknownCorpus {
                name: name.to_string(),
            })
    }

    /// Find the corpus that owns the source named `source`
    pub fn corpus_for_source(&self, source: &str) -> Option<Arc<dyn Corpus>> {
        self.corpora
            .iter()
            .find(|c| c.sources().iter().any(|s| s.name() == source))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(name: &str, enabled_by_default: bool) -> Arc<dyn Corpus> {
        Arc::new(ConfiguredCorpus::new(name, enabled_by_default, false, vec![]))
    }

    #[test]
    fn test_enabled_follows_defaults() {
        let mut corpora = Corpora::new(vec![corpus("web", true), corpus("music", false)]);
        let names: Vec<_> = corpora.enabled().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["web"]);

        corpora.set_enabled("music", true);
        corpora.set_enabled("web", false);
        let names: Vec<_> = corpora.enabled().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["music"]);
    }

    #[test]
    fn test_get_unknown_corpus() {
        let corpora = Corpora::new(vec![corpus("web", true)]);
        assert!(corpora.get("web").is_ok());
        assert!(matches!(
            corpora.get("nope"),
            Err(QsbError::UnknownCorpus { .. })
        ));
    }
}
