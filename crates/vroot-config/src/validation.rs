use std::collections::HashSet;

use crate::defaults::MAX_PROCESS_NAME_LEN;
use crate::types::ArbiterConfig;
use crate::ConfigError;

impl ArbiterConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for name in &self.crawlers {
            let name = name.trim();
            if name.is_empty() {
                errors.push(ConfigError::EmptyCrawlerName);
                continue;
            }
            if name.len() > MAX_PROCESS_NAME_LEN {
                // Host-reported names are truncated, so this entry could never match.
                errors.push(ConfigError::CrawlerNameTooLong(name.to_string(), MAX_PROCESS_NAME_LEN));
            }
            if !seen.insert(name) {
                errors.push(ConfigError::DuplicateCrawler(name.to_string()));
            }
        }

        if self.request_poll_interval.is_zero() {
            errors.push(ConfigError::InvalidDuration(
                "request_poll_interval".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        if self.drain_poll_interval.is_zero() {
            errors.push(ConfigError::InvalidDuration(
                "drain_poll_interval".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ArbiterConfig::default().validate().is_empty());
    }

    #[test]
    fn test_duplicate_crawler() {
        let config = ArbiterConfig::default().with_crawlers(["mds", "mds"]);
        let errors = config.validate();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::DuplicateCrawler(name) if name == "mds")));
    }

    #[test]
    fn test_blank_crawler() {
        let config = ArbiterConfig::default().with_crawlers(["  "]);
        assert!(matches!(
            config.validate_or_err(),
            Err(ConfigError::EmptyCrawlerName)
        ));
    }

    #[test]
    fn test_crawler_name_too_long() {
        let config = ArbiterConfig::default().with_crawlers(["com.example.indexer-agent"]);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::CrawlerNameTooLong(_, 16)));
    }

    #[test]
    fn test_zero_poll_intervals() {
        let config = ArbiterConfig::default()
            .with_request_poll_interval(Duration::ZERO)
            .with_drain_timing(Duration::ZERO, Duration::ZERO);
        let errors = config.validate();
        // Zero initial wait is allowed; the two poll intervals are not.
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ConfigError::InvalidDuration(_, _))));
    }

    #[test]
    fn test_padded_names_checked_after_trimming() {
        let config = ArbiterConfig::default().with_crawlers([" mds ", "mds"]);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ConfigError::DuplicateCrawler(name) if name == "mds"));

        // 16 bytes once trimmed.
        let config = ArbiterConfig::default().with_crawlers(["  com.example.inde  "]);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_empty_crawler_list_is_valid() {
        let config = ArbiterConfig::default().with_crawlers(Vec::<String>::new());
        assert!(config.validate_or_err().is_ok());
    }
}
