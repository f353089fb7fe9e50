use std::time::Duration;

use crate::types::{ArbiterConfig, HumanDuration, TransportFailurePolicy};

/// Background indexing and file-event processes that would otherwise hydrate
/// every placeholder they touch.
pub const DEFAULT_CRAWLER_PROCESSES: &[&str] =
    &["mds", "mdworker", "mds_stores", "fseventsd", "Spotlight"];

/// Hosts report at most this many bytes of a process name.
pub const MAX_PROCESS_NAME_LEN: usize = 16;

pub const DEFAULT_REQUEST_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DRAIN_INITIAL_WAIT: Duration = Duration::from_secs(1);
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

impl Default for ArbiterConfig {
    fn default() -> Self {
        ArbiterConfig {
            crawlers: DEFAULT_CRAWLER_PROCESSES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            request_poll_interval: HumanDuration(DEFAULT_REQUEST_POLL_INTERVAL),
            drain_initial_wait: HumanDuration(DEFAULT_DRAIN_INITIAL_WAIT),
            drain_poll_interval: HumanDuration(DEFAULT_DRAIN_POLL_INTERVAL),
            on_provider_unreachable: TransportFailurePolicy::Allow,
        }
    }
}

impl ArbiterConfig {
    /// Strip surrounding whitespace from crawler names and drop blank entries.
    pub fn apply_defaults(&mut self) {
        self.crawlers = self
            .crawlers
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> ArbiterConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }

    pub fn with_crawlers<I, S>(mut self, crawlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.crawlers = crawlers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_poll_interval(mut self, interval: Duration) -> Self {
        self.request_poll_interval = HumanDuration(interval);
        self
    }

    pub fn with_drain_timing(mut self, initial_wait: Duration, poll_interval: Duration) -> Self {
        self.drain_initial_wait = HumanDuration(initial_wait);
        self.drain_poll_interval = HumanDuration(poll_interval);
        self
    }

    pub fn with_transport_failure_policy(mut self, policy: TransportFailurePolicy) -> Self {
        self.on_provider_unreachable = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_crawlers() {
        let config = ArbiterConfig::default();
        assert_eq!(config.crawlers.len(), 5);
        assert!(config.crawlers.iter().any(|c| c == "mdworker"));
        assert!(config.crawlers.iter().any(|c| c == "Spotlight"));
    }

    #[test]
    fn test_default_timing() {
        let config = ArbiterConfig::default();
        assert_eq!(config.request_poll_interval.as_duration(), Duration::from_secs(5));
        assert_eq!(config.drain_initial_wait.as_duration(), Duration::from_secs(1));
        assert_eq!(config.drain_poll_interval.as_duration(), Duration::from_secs(1));
        assert_eq!(config.on_provider_unreachable, TransportFailurePolicy::Allow);
    }

    #[test]
    fn test_effective_trims_crawler_names() {
        let config = ArbiterConfig::default().with_crawlers(["  mds ", "", "indexd"]);
        let effective = config.effective();
        assert_eq!(effective.crawlers, vec!["mds".to_string(), "indexd".to_string()]);
        // Original untouched
        assert_eq!(config.crawlers.len(), 3);
    }

    #[test]
    fn test_builders() {
        let config = ArbiterConfig::default()
            .with_request_poll_interval(Duration::from_millis(20))
            .with_drain_timing(Duration::ZERO, Duration::from_millis(5))
            .with_transport_failure_policy(TransportFailurePolicy::Deny);
        assert_eq!(config.request_poll_interval.as_duration(), Duration::from_millis(20));
        assert!(config.drain_initial_wait.is_zero());
        assert_eq!(config.drain_poll_interval.as_duration(), Duration::from_millis(5));
        assert_eq!(config.on_provider_unreachable, TransportFailurePolicy::Deny);
    }
}
