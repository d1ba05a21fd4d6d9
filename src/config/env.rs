//! `${VAR}` / `$VAR` expansion for paths in report definitions.

use std::env;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{ConfigResult, ConfigurationError};

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Replace every `${VAR}` and `$VAR` with the variable's value.
///
/// A lone `$` is kept. An unset variable is an error.
pub fn expand_env_vars(input: &str) -> ConfigResult<String> {
    let mut missing = None;
    let expanded = ENV_VAR.replace_all(input, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(ConfigurationError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}
