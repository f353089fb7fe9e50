use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What the arbiter does when a hydration request cannot be handed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailurePolicy {
    /// Let the access through without hydrating.
    #[default]
    Allow,
    /// Deny with a "provider unreachable" error code.
    Deny,
}

/// Human-readable duration (e.g., "200ms", "5s", "1m").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl Default for HumanDuration {
    fn default() -> Self {
        HumanDuration(Duration::from_secs(0))
    }
}

impl HumanDuration {
    pub fn from_secs(secs: u64) -> Self {
        HumanDuration(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        HumanDuration(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        HumanDuration(d)
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
            (n, "ms")
        } else if let Some(n) = s.strip_suffix('s') {
            (n, "s")
        } else if let Some(n) = s.strip_suffix('m') {
            (n, "m")
        } else if let Some(n) = s.strip_suffix('h') {
            (n, "h")
        } else {
            return Err(format!("Invalid duration format: {}", s));
        };

        let num: u64 = num_str
            .trim()
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let duration = match unit {
            "ms" => Duration::from_millis(num),
            "s" => Duration::from_secs(num),
            "m" => Duration::from_secs(
                num.checked_mul(60)
                    .ok_or_else(|| format!("Duration out of range: {}", s))?,
            ),
            "h" => Duration::from_secs(
                num.checked_mul(3600)
                    .ok_or_else(|| format!("Duration out of range: {}", s))?,
            ),
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        let secs = self.0.as_secs();

        if millis % 1000 != 0 || millis == 0 {
            write!(f, "{}ms", millis)
        } else if secs % 3600 == 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Top-level configuration of the access arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArbiterConfig {
    /// Process names treated as filesystem crawlers.
    pub crawlers: Vec<String>,
    /// Upper bound on how long a blocked hydration request sleeps before
    /// re-checking the shutdown flag.
    pub request_poll_interval: HumanDuration,
    /// Unconditional wait before the first drain check during teardown.
    pub drain_initial_wait: HumanDuration,
    /// Period at which teardown re-checks the active-callback counter.
    pub drain_poll_interval: HumanDuration,
    /// Verdict when the provider channel refuses a hydration request.
    pub on_provider_unreachable: TransportFailurePolicy,
}
