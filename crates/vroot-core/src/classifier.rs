use std::collections::HashSet;

use vroot_config::{ArbiterConfig, DEFAULT_CRAWLER_PROCESSES};

/// Recognizes background processes that walk the whole filesystem.
#[derive(Debug, Clone)]
pub struct ProcessClassifier {
    crawlers: HashSet<String>,
}

impl ProcessClassifier {
    pub fn new<I, S>(crawlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProcessClassifier {
            crawlers: crawlers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ArbiterConfig) -> Self {
        Self::new(config.crawlers.iter().cloned())
    }

    /// Exact, case-sensitive match against the configured names.
    pub fn is_crawler(&self, process_name: &str) -> bool {
        self.crawlers.contains(process_name)
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }
}

impl Default for ProcessClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CRAWLER_PROCESSES.iter().copied())
    }
}
