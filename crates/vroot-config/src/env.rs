use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;

use crate::ConfigError;

fn placeholder_pattern() -> Result<&'static Regex, ConfigError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}"))
        .as_ref()
        .map_err(|e| ConfigError::InvalidConfig(format!("env placeholder pattern: {}", e)))
}

/// Interpolate environment variables in a string.
///
/// `${VAR}` is replaced with the variable's value; `${VAR:-fallback}` uses
/// `fallback` when the variable is unset. Every unset variable without a
/// fallback is reported at once.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let re = placeholder_pattern()?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |cap: &Captures<'_>| {
        let var_name = &cap[1];
        match (env::var(var_name), cap.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                missing.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }

    Ok(result.into_owned())
}
